//! Command implementations for the CLI.

pub mod init;
pub mod list;
pub mod render;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::Cli;
use crate::config::{CONFIG_FILE_NAME, Settings};
use crate::error::EngineError;
use crate::reporter::ErrorSink;

/// `--config` if given, else `./tplindex.toml`.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| CONFIG_FILE_NAME.into())
}

/// Load settings from the chosen file and apply command-line overrides.
pub fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let path = config_path(cli);

    let mut settings = Settings::load_from(&path)
        .map_err(EngineError::from)
        .with_context(|| format!("loading {}", path.display()))?;

    if let Some(root) = &cli.root {
        settings.root = root.clone();
    }
    if !cli.extensions.is_empty() {
        settings.extensions = cli.extensions.clone();
    }

    Ok(settings)
}

/// Sink printing non-fatal errors to stderr, for one-shot commands.
pub fn stderr_sink() -> Arc<dyn ErrorSink> {
    Arc::new(|err: &EngineError| eprintln!("warning: {err}"))
}
