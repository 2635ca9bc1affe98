//! Registry of subscribed directories.
//!
//! notify runs in non-recursive mode, so every directory is its own
//! subscription. The registry keeps subscriptions idempotent and lets a
//! removed directory (and everything below it) be forgotten at once.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct PathRegistry {
    dirs: BTreeSet<PathBuf>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `dir`. Returns `false` if it was already registered.
    pub fn insert(&mut self, dir: PathBuf) -> bool {
        self.dirs.insert(dir)
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    /// Forget `dir` and every registered directory below it.
    ///
    /// Returns the forgotten directories, deepest first.
    pub fn remove_tree(&mut self, dir: &Path) -> Vec<PathBuf> {
        let mut removed: Vec<PathBuf> = self
            .dirs
            .iter()
            .filter(|d| d.starts_with(dir))
            .cloned()
            .collect();
        self.dirs.retain(|d| !d.starts_with(dir));
        removed.reverse();
        removed
    }

    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}
