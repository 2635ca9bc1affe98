//! Recursive template discovery.
//!
//! One walk yields both the template files to compile and the
//! directories the watcher must subscribe to (notify is used in
//! non-recursive mode, one subscription per directory).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Errors from scanning the template tree. Any failure aborts the scan.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot read template directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Scan root {path} is not a directory")]
    NotADirectory { path: PathBuf },
}

/// Allowed template file extensions, stored without the leading dot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: BTreeSet<String>,
}

impl ExtensionSet {
    /// Build from configured suffixes. `".html"` and `"html"` are the same;
    /// empty suffixes are discarded.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    /// Whether `path` has one of the allowed extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(ext))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

/// Result of a scan.
#[derive(Debug, Default, Clone)]
pub struct ScanOutcome {
    /// Template files, in walk order (sorted by file name per directory).
    pub files: Vec<PathBuf>,
    /// Every directory visited, the scan root first.
    pub directories: Vec<PathBuf>,
}

/// Walks a directory tree collecting templates and directories.
#[derive(Debug, Clone)]
pub struct PathScanner {
    extensions: ExtensionSet,
}

impl PathScanner {
    pub fn new(extensions: ExtensionSet) -> Self {
        Self { extensions }
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Scan `dir` and everything below it.
    ///
    /// Symlinked directories are not descended into; a symlink to a
    /// template file is indexed under the link's own path. Entries are
    /// sorted by file name so the order (and therefore which file wins a
    /// name collision) is stable.
    pub fn scan(&self, dir: &Path) -> Result<ScanOutcome, ScanError> {
        if !dir.is_dir() {
            return Err(ScanError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }

        let mut outcome = ScanOutcome::default();

        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        for entry in walker {
            let entry = entry.map_err(|source| ScanError::Unreadable {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.to_path_buf()),
                source,
            })?;

            let file_type = entry.file_type();
            if file_type.is_dir() {
                outcome.directories.push(entry.into_path());
            } else if self.is_template(&entry) {
                outcome.files.push(entry.into_path());
            }
        }

        crate::debug_event!(
            "scan",
            "completed",
            "{} templates in {} directories under {}",
            outcome.files.len(),
            outcome.directories.len(),
            dir.display()
        );

        Ok(outcome)
    }

    fn is_template(&self, entry: &walkdir::DirEntry) -> bool {
        let file_type = entry.file_type();
        let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        is_file && self.extensions.matches(entry.path())
    }
}
