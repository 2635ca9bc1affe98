//! Template root and name derivation.
//!
//! A template's name is its path relative to the root, with the last
//! extension stripped and separators normalized to `/`:
//! `<root>/emails/welcome.html` is `emails/welcome`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Canonical template root directory. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root(PathBuf);

impl Root {
    /// Resolve `path` to an absolute, canonical directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(EngineError::InvalidRoot {
                path: path.to_path_buf(),
                reason: "template root is empty".to_string(),
            });
        }

        let canonical = path
            .canonicalize()
            .map_err(|e| EngineError::InvalidRoot {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !canonical.is_dir() {
            return Err(EngineError::InvalidRoot {
                path: canonical,
                reason: "not a directory".to_string(),
            });
        }

        Ok(Self(canonical))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for Root {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Name under which a template is looked up by renderers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateName(String);

impl TemplateName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TemplateName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl std::borrow::Borrow<str> for TemplateName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Derive the template name for `path`.
///
/// Paths outside `root` are not rejected: they keep their full path and
/// only lose the extension.
pub fn template_name(root: &Path, path: &Path) -> TemplateName {
    let relative = relative_to(root, path);

    let stem = match relative.extension() {
        Some(_) => relative.with_extension(""),
        None => relative.to_path_buf(),
    };

    TemplateName(normalize_separators(&stem.to_string_lossy()))
}

/// Key a template is registered under in the shared template set.
///
/// The root-relative path with its extension, `/`-separated. This is what
/// `{% extends %}` and `{% include %}` refer to, and its suffix decides
/// autoescaping.
pub fn template_key(root: &Path, path: &Path) -> String {
    normalize_separators(&relative_to(root, path).to_string_lossy())
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> &'a Path {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path,
    }
}

fn normalize_separators(name: &str) -> String {
    if std::path::MAIN_SEPARATOR == '/' {
        name.to_string()
    } else {
        name.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
