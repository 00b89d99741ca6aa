//! Configuration layer: typed settings with layered precedence (file → env).

use std::num::NonZeroUsize;
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::StoreLimits;

const LOCAL_CONFIG_BASENAME: &str = "schedario";
const ENV_PREFIX: &str = "SCHEDARIO";

const DEFAULT_DETAIL_STALENESS_MS: u64 = 120_000;
const DEFAULT_COLLECTION_STALENESS_MS: u64 = 30_000;
const DEFAULT_IDLE_EVICTION_MS: u64 = 600_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;
const DEFAULT_DETAIL_SLOT_LIMIT: usize = 500;
const DEFAULT_COLLECTION_SLOT_LIMIT: usize = 50;
const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration could not be loaded: {0}")]
    Load(#[from] config::ConfigError),
}

/// Root settings, deserialized from `schedario.toml` with `SCHEDARIO__*`
/// environment overrides layered on top.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

impl Settings {
    pub fn load(config_file: Option<&Path>) -> Result<Self, SettingsError> {
        let builder = match config_file {
            Some(path) => Config::builder().add_source(File::from(path)),
            None => Config::builder()
                .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false)),
        };
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

/// Cache tuning from the `[cache]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Staleness horizon for detail slots.
    pub detail_staleness_ms: u64,
    /// Staleness horizon for collection slots. Shorter than the detail
    /// horizon by default: membership churns faster than record attributes.
    pub collection_staleness_ms: u64,
    /// Idle horizon after which an unsubscribed slot is dropped.
    pub idle_eviction_ms: u64,
    /// Cadence on which the host drives the maintenance sweep.
    pub sweep_interval_ms: u64,
    /// Maximum detail slots held at once.
    pub detail_slot_limit: usize,
    /// Maximum collection slots held at once.
    pub collection_slot_limit: usize,
    /// Page size the list screens request by default.
    pub default_page_size: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            detail_staleness_ms: DEFAULT_DETAIL_STALENESS_MS,
            collection_staleness_ms: DEFAULT_COLLECTION_STALENESS_MS,
            idle_eviction_ms: DEFAULT_IDLE_EVICTION_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            detail_slot_limit: DEFAULT_DETAIL_SLOT_LIMIT,
            collection_slot_limit: DEFAULT_COLLECTION_SLOT_LIMIT,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CacheSettings {
    /// Returns the detail slot limit as NonZeroUsize, clamping to 1 if zero.
    pub fn detail_slot_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.detail_slot_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the collection slot limit as NonZeroUsize, clamping to 1 if zero.
    pub fn collection_slot_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.collection_slot_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn store_limits(&self) -> StoreLimits {
        StoreLimits {
            detail_slots: self.detail_slot_limit_non_zero(),
            collection_slots: self.collection_slot_limit_non_zero(),
        }
    }
}
