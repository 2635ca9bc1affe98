//! tplindex - a live-reloading template index.
//!
//! Scans a directory tree for template files, compiles them into one
//! shared Tera set (so layouts, includes and macro imports resolve across
//! files), resolves template names to files for rendering, and keeps
//! everything in sync with the filesystem while the process runs.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tplindex::{Settings, TemplateEngine, TracingSink};
//!
//! let settings = Settings::for_root("templates");
//! let engine = TemplateEngine::open(&settings, Arc::new(TracingSink))?;
//! let html = engine.render("index", &serde_json::json!({ "title": "Home" }))?;
//! # Ok::<(), tplindex::EngineError>(())
//! ```

pub mod logging;

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod names;
pub mod reload;
pub mod reporter;
pub mod scanner;
pub mod set;
pub mod state;
pub mod watcher;

pub use cache::{CompileError, CompiledTemplate, TemplateCache};
pub use config::{LoggingConfig, ReloadConfig, RemovePolicy, Settings};
pub use engine::{EngineBuilder, TemplateEngine};
pub use error::{EngineError, EngineResult};
pub use index::TemplateIndex;
pub use names::{Root, TemplateName, template_name};
pub use reload::ReloadCoordinator;
pub use reporter::{ErrorSink, TracingSink};
pub use scanner::{ExtensionSet, PathScanner, ScanError, ScanOutcome};
pub use set::{Admission, TemplateSet};
pub use state::EngineState;
pub use watcher::{
    RescanQueue, TemplateWatcher, WatchError, WatchEvent, WatchEventKind, WatchStreams,
};
