//! Error types for the template watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The watch mechanism could not be created, or the root could not be
    /// subscribed. Live reload is off for the process.
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    /// A single directory could not be subscribed; its changes are missed.
    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    /// The notification backend reported an error after startup.
    #[error("File system event error: {details}")]
    EventError { details: String },

    /// The coordinator fell behind and an event was dropped.
    #[error("Dropped change event for {path}: reload queue full")]
    DeliveryTimeout { path: PathBuf },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::EventError {
            details: e.to_string(),
        }
    }
}
