//! Error taxonomy for the template engine.
//!
//! Component errors live next to their component ([`ScanError`],
//! [`CompileError`], [`WatchError`]); [`EngineError`] is what the public
//! engine API returns and what the error sink receives.

use std::path::PathBuf;
use thiserror::Error;

use crate::cache::CompileError;
use crate::scanner::ScanError;
use crate::watcher::WatchError;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Template root missing, unreadable, or not a directory
    #[error("Invalid template root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// Initial scan failed; fatal to construction
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Template file could not be read or parsed
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Watch mechanism could not be created or the root not subscribed
    #[error("Live reload disabled: {0}")]
    WatchInit(#[source] WatchError),

    /// A watched directory failed after startup
    #[error(transparent)]
    Subscription(WatchError),

    /// No template indexed under this name
    #[error("Template '{name}' not found")]
    NotFound { name: String },

    /// Template executed with an error
    #[error("Failed to render template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },

    /// Render data overlaps the global context
    #[error("Render data key '{key}' already exists in the global context")]
    DuplicateContextKey { key: String },

    /// A registered template function shares its name with a global value
    #[error("Template function '{name}' collides with a global context key")]
    DuplicateFunction { name: String },

    /// Render data was not a JSON object
    #[error("Unsupported render data: expected a JSON object, got {kind}")]
    InvalidRenderData { kind: &'static str },

    /// Writing rendered output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl EngineError {
    /// Route a watcher error to the startup or post-startup variant.
    pub fn from_watch(err: WatchError) -> Self {
        match err {
            WatchError::InitFailed { .. } => EngineError::WatchInit(err),
            other => EngineError::Subscription(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = EngineError::NotFound {
            name: "missing".to_string(),
        };
        assert_eq!(err.to_string(), "Template 'missing' not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_error_display_duplicate_key() {
        let err = EngineError::DuplicateContextKey {
            key: "site".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Render data key 'site' already exists in the global context"
        );
    }

    #[test]
    fn test_error_display_duplicate_function() {
        let err = EngineError::DuplicateFunction {
            name: "now".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Template function 'now' collides with a global context key"
        );
    }

    #[test]
    fn test_watch_errors_are_routed_by_kind() {
        let init = EngineError::from_watch(WatchError::InitFailed {
            reason: "no inotify".to_string(),
        });
        assert!(matches!(init, EngineError::WatchInit(_)));

        let sub = EngineError::from_watch(WatchError::PathWatchFailed {
            path: PathBuf::from("/srv/templates/gone"),
            reason: "No such file or directory".to_string(),
        });
        assert!(matches!(sub, EngineError::Subscription(_)));
        assert!(!sub.is_not_found());
    }
}
