//! Compiled template store keyed by file path.
//!
//! Freshness is content based: `prepare` hashes the file and reuses the
//! cached artifact when the hash is unchanged, so a Modified event for an
//! identical save costs a read and a hash, not a parse.
//!
//! Artifacts are parsed and syntax-checked here. Resolving `extends`,
//! `include` and macro imports against other templates happens in
//! [`crate::set::TemplateSet`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::names::template_key;

/// Errors from compiling a single template file.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Cannot read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template syntax error in {path}: {source}")]
    Syntax {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },

    /// Parsed, but a parent layout or imported macro file is missing.
    #[error("Template {path} does not resolve: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },
}

impl CompileError {
    pub fn path(&self) -> &Path {
        match self {
            CompileError::Read { path, .. }
            | CompileError::Syntax { path, .. }
            | CompileError::Resolve { path, .. } => path,
        }
    }
}

/// A parsed template source. Shared read-only via `Arc`.
pub struct CompiledTemplate {
    path: PathBuf,
    key: String,
    hash: String,
    source: String,
}

impl CompiledTemplate {
    fn parse(path: &Path, key: String, source: String, hash: String) -> Result<Self, tera::Error> {
        tera::Template::new(&key, Some(path.to_string_lossy().into_owned()), &source)?;
        Ok(Self {
            path: path.to_path_buf(),
            key,
            hash,
            source,
        })
    }

    /// Source file this artifact was compiled from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key in the shared template set (root-relative path).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// SHA-256 of the source content, hex encoded.
    pub fn content_hash(&self) -> &str {
        &self.hash
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("path", &self.path)
            .field("key", &self.key)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

/// Hex-encoded SHA-256 of template source.
pub fn content_hash(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Path → compiled artifact store.
///
/// Reads are lock-free from the caller's point of view (sharded map);
/// after startup the reload coordinator is the only writer.
#[derive(Debug)]
pub struct TemplateCache {
    root: PathBuf,
    entries: DashMap<PathBuf, Arc<CompiledTemplate>>,
}

impl TemplateCache {
    /// Cache for templates under `root`; keys are derived relative to it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: DashMap::new(),
        }
    }

    /// Read and parse `path` without storing the result.
    ///
    /// Returns the cached artifact itself when the content is unchanged.
    pub fn prepare(&self, path: &Path) -> Result<Arc<CompiledTemplate>, CompileError> {
        let source = std::fs::read_to_string(path).map_err(|source| CompileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let hash = content_hash(source.as_bytes());

        if let Some(cached) = self.fresh(path, &hash) {
            crate::debug_event!("cache", "unchanged", "{}", path.display());
            return Ok(cached);
        }

        let key = template_key(&self.root, path);
        let compiled = CompiledTemplate::parse(path, key, source, hash).map_err(|source| {
            CompileError::Syntax {
                path: path.to_path_buf(),
                source,
            }
        })?;
        crate::debug_event!("cache", "parsed", "{}", path.display());

        Ok(Arc::new(compiled))
    }

    /// Store `compiled`, replacing any prior entry for its path.
    pub fn insert(&self, compiled: Arc<CompiledTemplate>) {
        self.entries.insert(compiled.path.clone(), compiled);
    }

    /// [`TemplateCache::prepare`] then [`TemplateCache::insert`].
    ///
    /// On failure the prior entry, if any, is left in place.
    pub fn compile(&self, path: &Path) -> Result<Arc<CompiledTemplate>, CompileError> {
        let compiled = self.prepare(path)?;
        self.insert(Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Whether `compiled` is the artifact currently stored for its path.
    pub fn is_current(&self, compiled: &Arc<CompiledTemplate>) -> bool {
        self.entries
            .get(&compiled.path)
            .is_some_and(|cached| Arc::ptr_eq(cached.value(), compiled))
    }

    fn fresh(&self, path: &Path, hash: &str) -> Option<Arc<CompiledTemplate>> {
        self.entries
            .get(path)
            .filter(|cached| cached.hash == hash)
            .map(|cached| Arc::clone(cached.value()))
    }

    pub fn get(&self, path: &Path) -> Option<Arc<CompiledTemplate>> {
        self.entries.get(path).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the entry for `path`. Returns whether one existed.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drop every entry at or below `path`. Returns how many were dropped.
    pub fn invalidate_under(&self, path: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|cached, _| !cached.starts_with(path));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted snapshot of cached paths.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    /// Every cached artifact, sorted by path.
    pub fn templates(&self) -> Vec<Arc<CompiledTemplate>> {
        let mut templates: Vec<_> = self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        templates.sort_by(|a, b| a.path.cmp(&b.path));
        templates
    }
}
