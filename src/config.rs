//! Layered configuration for the template index.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - a TOML file (`tplindex.toml` in the working directory, or an explicit path)
//! - environment variables
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TPLINDEX_` and use double
//! underscores to separate nested levels:
//! - `TPLINDEX_ROOT=views` sets `root`
//! - `TPLINDEX_LIVE_RELOAD=false` sets `live_reload`
//! - `TPLINDEX_RELOAD__REMOVE_POLICY=evict` sets `reload.remove_policy`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "tplindex.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TPLINDEX_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Template root directory
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Allowed template file extensions (".html" or "html")
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Watch the root for changes and recompile templates as they change.
    /// Production deployments usually turn this off and rely on the initial scan.
    #[serde(default = "default_true")]
    pub live_reload: bool,

    /// Live-reload behavior
    #[serde(default)]
    pub reload: ReloadConfig,

    /// Global render context, merged under every render call's data
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,

    /// Logging levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ReloadConfig {
    /// What a Removed event does to the index and cache
    #[serde(default)]
    pub remove_policy: RemovePolicy,

    /// Subscribe directories created after startup and index their templates
    #[serde(default = "default_true")]
    pub watch_new_directories: bool,

    /// Capacity of the watcher → coordinator event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// How long the watcher waits on a full channel before dropping an event
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

/// Handling of Removed events.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemovePolicy {
    /// Keep index and cache entries; a deleted template stays renderable
    /// until restart or until the path is created again.
    #[default]
    Retain,
    /// Drop index names and cache entries at or below the removed path.
    Evict,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level for everything (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `"tplindex::reload" = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_root() -> PathBuf {
    PathBuf::from("templates")
}
fn default_extensions() -> Vec<String> {
    vec![".html".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_channel_capacity() -> usize {
    8
}
fn default_send_timeout_ms() -> u64 {
    250
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            root: default_root(),
            extensions: default_extensions(),
            live_reload: true,
            reload: ReloadConfig::default(),
            context: serde_json::Map::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            remove_policy: RemovePolicy::default(),
            watch_new_directories: true,
            channel_capacity: default_channel_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Settings for a given root with every other value at its default.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `tplindex.toml` in the working directory
    /// (if present) and the environment.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(CONFIG_FILE_NAME)
    }

    /// Load configuration from a specific file plus the environment.
    ///
    /// A missing file is not an error; defaults and env still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            // Double underscore separates nested levels; single underscores
            // stay part of the field name.
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write a default configuration file at `path`.
    pub fn init_config_file(
        path: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if !force && path.exists() {
            return Err(format!(
                "Configuration file {} already exists. Use --force to overwrite",
                path.display()
            )
            .into());
        }

        Settings::default().save(path)?;
        Ok(path.to_path_buf())
    }
}
