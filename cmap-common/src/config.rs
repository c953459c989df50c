//! Configuration loading and database path resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the database file
pub const ENV_DATABASE: &str = "CMAP_DATABASE";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "CMAP_LOG_LEVEL";
/// Environment variable pointing at an explicit config file
pub const ENV_CONFIG: &str = "CMAP_CONFIG";

/// Top-level TOML configuration file contents.
///
/// Stage definitions (`[[stage]]` tables) are kept as raw TOML values here;
/// the pipeline crate parses them into typed stage configs so that this crate
/// stays free of pipeline-specific vocabulary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite document store
    pub database: Option<PathBuf>,
    /// Log level (trace/debug/info/warn/error)
    pub log_level: Option<String>,
    /// Number of pipeline workers
    pub workers: Option<usize>,
    /// Pipeline stage definitions, parsed downstream
    #[serde(default, rename = "stage")]
    pub stages: Vec<toml::Value>,
}

impl TomlConfig {
    /// Load a TOML config from an explicit path.
    ///
    /// A missing file is a configuration error when the path was given
    /// explicitly; use [`TomlConfig::discover`] for the tolerant variant.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Locate and load the config file, falling back to defaults.
    ///
    /// Search order: `CMAP_CONFIG` env var, then the platform config
    /// directory (`cmap/config.toml`), then `/etc/cmap/config.toml` on
    /// Linux. A missing config file is not an error; the compiled defaults
    /// apply.
    pub fn discover() -> Self {
        for candidate in config_file_candidates() {
            if candidate.exists() {
                match Self::load(&candidate) {
                    Ok(config) => {
                        tracing::info!(path = %candidate.display(), "Loaded config file");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %candidate.display(),
                            error = %e,
                            "Ignoring unreadable config file"
                        );
                    }
                }
            }
        }
        tracing::info!("No config file found, using defaults");
        Self::default()
    }
}

fn config_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        candidates.push(PathBuf::from(path));
    }
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("cmap").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/cmap/config.toml"));
    }
    candidates
}

/// Resolve the database path following the standard priority order.
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(ENV_DATABASE) {
        return PathBuf::from(path);
    }
    if let Some(path) = &config.database {
        return path.clone();
    }
    default_database_path()
}

/// Resolve the log level following the standard priority order.
pub fn resolve_log_level(cli_arg: Option<&str>, config: &TomlConfig) -> String {
    if let Some(level) = cli_arg {
        return level.to_string();
    }
    if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
        return level;
    }
    config
        .log_level
        .clone()
        .unwrap_or_else(|| "info".to_string())
}

/// OS-dependent default location of the document store
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cmap"))
        .unwrap_or_else(|| PathBuf::from("./cmap_data"))
        .join("cmap.db")
}
