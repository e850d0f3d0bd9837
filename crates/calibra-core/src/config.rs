//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3010;
pub const DEFAULT_FRAGMENT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 4;

/// Paths to all Calibra data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Card database directory (`data/db/`).
    pub db: PathBuf,
    /// Provider configuration (`data/provider-config.json`).
    pub provider_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            provider_config_file: root.join("provider-config.json"),
            root,
        };
        std::fs::create_dir_all(&paths.db)?;
        Ok(paths)
    }
}

/// Top-level Calibra configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibraConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Inter-fragment timeout shared by backend selection and stall detection.
    pub fragment_timeout_ms: u64,
    /// Maximum concurrent catalog lookups while resolving comparisons.
    pub resolve_concurrency: usize,
    /// Metadata catalog API key (TMDB).
    #[serde(skip_serializing)]
    pub catalog_api_key: Option<String>,
}

impl CalibraConfig {
    /// Create configuration from environment and defaults.
    ///
    /// Unset variables take their defaults; set but unparsable ones are errors.
    pub fn from_env(data_dir: impl AsRef<Path>) -> crate::Result<Self> {
        let port = env_setting("PORT")?.unwrap_or(DEFAULT_PORT);
        let fragment_timeout_ms =
            env_setting("CALIBRA_FRAGMENT_TIMEOUT_MS")?.unwrap_or(DEFAULT_FRAGMENT_TIMEOUT_MS);
        let resolve_concurrency = env_setting::<usize>("CALIBRA_RESOLVE_CONCURRENCY")?
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RESOLVE_CONCURRENCY);
        let catalog_api_key = std::env::var("TMDB_API_KEY").ok().filter(|k| !k.is_empty());

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            fragment_timeout_ms,
            resolve_concurrency,
            catalog_api_key,
        })
    }

    pub fn fragment_timeout(&self) -> Duration {
        Duration::from_millis(self.fragment_timeout_ms)
    }
}

fn env_setting<T: std::str::FromStr>(key: &str) -> crate::Result<Option<T>> {
    parse_setting(key, std::env::var(key).ok().as_deref())
}

fn parse_setting<T: std::str::FromStr>(key: &str, raw: Option<&str>) -> crate::Result<Option<T>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| crate::Error::Config(format!("{} has invalid value {:?}", key, v))),
    }
}
