//! Configuration management
//!
//! Settings come from the environment (optionally seeded from a `.env` file)
//! with the defaults below. Command-line flags override individual values
//! after loading.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vtel_common::{Result, VtelError};

use crate::db::DbConfig;
use crate::models::ObjectTypes;
use crate::watch::{same_directory, WatchConfig};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default poll interval in milliseconds.
pub const DEFAULT_WATCH_INTERVAL_MS: u64 = 1000;

/// Default watched directory.
pub const DEFAULT_WATCH_DIR: &str = ".";

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub database: DbConfig,
    pub ingest: IngestConfig,
    pub watch: WatchConfig,
}

/// Ingestion rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestConfig {
    /// Accepted detection object types
    pub object_types: ObjectTypes,
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the process environment only
    pub fn from_env() -> Result<Self> {
        let database = DbConfig::from_env()?;

        let object_types = std::env::var("VTEL_OBJECT_TYPES")
            .ok()
            .map(|s| ObjectTypes::new(s.split(',')))
            .unwrap_or_default();

        let watch = WatchConfig {
            directory: std::env::var("VTEL_WATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_WATCH_DIR)),
            interval: Duration::from_millis(
                env_parse::<u64>("VTEL_WATCH_INTERVAL_MS")?.unwrap_or(DEFAULT_WATCH_INTERVAL_MS),
            ),
            timeout: env_parse::<f64>("VTEL_WATCH_TIMEOUT_SECS")?
                .map(|secs| seconds("VTEL_WATCH_TIMEOUT_SECS", secs))
                .transpose()?,
            delay: env_parse::<u64>("VTEL_WATCH_DELAY_MS")?.map(Duration::from_millis),
            extension: std::env::var("VTEL_WATCH_EXTENSION")
                .map(|ext| ext.trim_start_matches('.').to_string())
                .unwrap_or_else(|_| crate::watch::DEFAULT_EXTENSION.to_string()),
            archive_dir: std::env::var("VTEL_ARCHIVE_DIR").ok().map(PathBuf::from),
        };

        let config = Config {
            database,
            ingest: IngestConfig { object_types },
            watch,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;

        if self.ingest.object_types.is_empty() {
            return Err(VtelError::config("VTEL_OBJECT_TYPES must name at least one object type"));
        }

        if self.watch.interval.is_zero() {
            return Err(VtelError::config("Watch interval must be greater than 0"));
        }

        if self.watch.extension.trim().is_empty() {
            return Err(VtelError::config("Watch extension cannot be empty"));
        }

        if let Some(archive_dir) = &self.watch.archive_dir {
            if same_directory(archive_dir, &self.watch.directory) {
                return Err(VtelError::config(format!(
                    "VTEL_ARCHIVE_DIR must differ from the watched directory ({})",
                    archive_dir.display()
                )));
            }
        }

        Ok(())
    }
}

/// Parse an optional environment variable, rejecting malformed values.
fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| VtelError::config(format!("{} has an invalid value '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

/// Convert fractional seconds into a `Duration`.
pub fn seconds(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| VtelError::config(format!("{} must be a non-negative number of seconds, got {}", name, secs)))
}
