//! Application configuration (TOML).
//!
//! ```toml
//! watchlist = ["AAPL", "msft"]
//!
//! [engine]
//! period = 10
//! sensitivity = 1.0
//! source_mode = "close"
//! bucket_width_ms = 60000
//! late_ticks = "ignore"
//!
//! [store]
//! path = "data/signals.jsonl"
//!
//! [smtp]
//! host = "smtp.example.com"
//! port = 587
//! user = "alerts"
//! pass = "secret"
//!
//! [[alerts]]
//! symbol = "AAPL"
//! side = "BUY"
//! email = "me@example.com"
//! ```
//!
//! Every table is optional; missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use trailwatch_core::{ConfigError, EngineConfig};

use crate::alerts::{AlertRule, SmtpSettings};

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine config: {0}")]
    Engine(#[from] ConfigError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// JSONL file receiving every emitted signal.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/signals.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    /// Symbols tracked from startup.
    pub watchlist: Vec<String>,
    pub store: StoreConfig,
    pub smtp: SmtpSettings,
    pub alerts: Vec<AlertRule>,
}

impl AppConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, AppConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| AppConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, AppConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Timeframe label under which signals are persisted.
    pub fn timeframe(&self) -> String {
        timeframe_label(self.engine.bucket_width_ms)
    }
}

/// Human label for a bucket width: `60000` → `"1m"`, `3600000` → `"1h"`.
pub fn timeframe_label(width_ms: i64) -> String {
    const SEC: i64 = 1_000;
    const MIN: i64 = 60 * SEC;
    const HOUR: i64 = 60 * MIN;
    const DAY: i64 = 24 * HOUR;

    match width_ms {
        w if w > 0 && w % DAY == 0 => format!("{}d", w / DAY),
        w if w > 0 && w % HOUR == 0 => format!("{}h", w / HOUR),
        w if w > 0 && w % MIN == 0 => format!("{}m", w / MIN),
        w if w > 0 && w % SEC == 0 => format!("{}s", w / SEC),
        w => format!("{w}ms"),
    }
}
