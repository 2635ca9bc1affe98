//! Name → path index consulted by renderers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::names::TemplateName;

/// Authoritative template name → file path mapping.
///
/// Many concurrent readers, one writer (the reload coordinator after
/// startup). Every `put` happens under the write lock, so a reader sees
/// either the previous path or the new one.
#[derive(Debug, Default)]
pub struct TemplateIndex {
    entries: RwLock<HashMap<TemplateName, PathBuf>>,
}

impl TemplateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the mapping for `name`. Last write wins.
    ///
    /// Returns the previous path, if any.
    pub fn put(&self, name: TemplateName, path: PathBuf) -> Option<PathBuf> {
        let previous = self.entries.write().insert(name.clone(), path.clone());

        if let Some(ref old) = previous {
            if *old != path {
                tracing::warn!(
                    "[index] name '{name}' now maps to {} (was {})",
                    path.display(),
                    old.display()
                );
            }
        }

        previous
    }

    pub fn lookup(&self, name: &str) -> Option<PathBuf> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Remove every name mapped to `path` or to a path below it.
    ///
    /// Returns the removed names, sorted.
    pub fn remove_path(&self, path: &Path) -> Vec<TemplateName> {
        let mut entries = self.entries.write();
        let mut removed: Vec<TemplateName> = entries
            .iter()
            .filter(|(_, mapped)| mapped.starts_with(path))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &removed {
            entries.remove(name);
        }
        removed.sort();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Sorted snapshot of all entries.
    pub fn entries(&self) -> Vec<(TemplateName, PathBuf)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(name, path)| (name.clone(), path.clone()))
            .collect();
        entries.sort();
        entries
    }
}
