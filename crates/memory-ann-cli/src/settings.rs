//! Configuration loading for the memory-ann CLI.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/memory-ann/config.toml.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use memory_ann::GraphConfig;

/// CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Snapshot file the CLI loads from and persists to
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// Vector dimension of the index
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Link bound per node (M)
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,

    /// Candidate pool size during search (ef)
    #[serde(default = "default_search_width")]
    pub search_width: usize,

    /// Results returned by `search` when `-k` is not given
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Minimum similarity for `search` when `-t` is not given
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_snapshot_path() -> String {
    ProjectDirs::from("", "", "memory-ann")
        .map(|p| p.data_local_dir().join("index.json"))
        .unwrap_or_else(|| PathBuf::from("./memory-ann-index.json"))
        .to_string_lossy()
        .to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_max_neighbors() -> usize {
    16
}

fn default_search_width() -> usize {
    32
}

fn default_k() -> usize {
    10
}

fn default_threshold() -> f64 {
    0.0
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            dimension: default_dimension(),
            max_neighbors: default_max_neighbors(),
            search_width: default_search_width(),
            default_k: default_k(),
            default_threshold: default_threshold(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/memory-ann/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (MEMORY_ANN_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let config_dir = ProjectDirs::from("", "", "memory-ann")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("snapshot_path", default_snapshot_path())?
            .set_default("dimension", default_dimension() as i64)?
            .set_default("max_neighbors", default_max_neighbors() as i64)?
            .set_default("search_width", default_search_width() as i64)?
            .set_default("default_k", default_k() as i64)?
            .set_default("default_threshold", default_threshold())?
            .set_default("log_level", default_log_level())?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: MEMORY_ANN_SNAPSHOT_PATH, MEMORY_ANN_DIMENSION, etc.
        // The double-underscore separator keeps snake_case keys intact.
        builder = builder.add_source(
            Environment::with_prefix("MEMORY_ANN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Graph parameters for a freshly created index.
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig::new(self.dimension)
            .with_max_neighbors(self.max_neighbors)
            .with_search_width(self.search_width)
    }

    /// Expand ~ in snapshot_path to the home directory
    pub fn expanded_snapshot_path(&self) -> PathBuf {
        if let Some(rest) = self.snapshot_path.strip_prefix("~/") {
            if let Some(base) = directories::BaseDirs::new() {
                return base.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.snapshot_path)
    }
}
