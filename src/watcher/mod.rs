//! Filesystem watching for live reload.
//!
//! # Architecture
//!
//! ```text
//! notify::RecommendedWatcher (one non-recursive watch per directory)
//!         |  raw notify::Event
//!         v
//!   OpFlags -> classify() -> WatchEvent      (callback thread)
//!         |  bounded channel, send with timeout
//!         v
//!   ReloadCoordinator                        (single consumer)
//! ```
//!
//! An event that cannot be delivered in time is dropped and its directory
//! goes on a [`RescanQueue`]; the coordinator rescans it later.

mod error;
mod event;
mod path_registry;
mod rescan;
mod template_watcher;

pub use error::WatchError;
pub use event::{EventClass, OpFlags, WatchEvent, WatchEventKind, classify};
pub use path_registry::PathRegistry;
pub use rescan::RescanQueue;
pub use template_watcher::{TemplateWatcher, WatchStreams};
