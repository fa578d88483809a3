//! Engine configuration and construction-time validation.
//!
//! Every core component takes its parameters from an [`EngineConfig`] and
//! refuses to construct from an invalid one, so no engine can exist in an
//! invalid state.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Configuration errors. All are fatal at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("ATR period must be >= 1 (got {0})")]
    InvalidPeriod(usize),

    #[error("bucket width must be > 0 ms (got {0})")]
    InvalidBucketWidth(i64),

    #[error("sensitivity must be a positive finite number (got {0})")]
    InvalidSensitivity(f64),
}

/// Which price the indicator tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// The bar's close.
    #[default]
    Close,
    /// Mean of open, high, low, close (Heikin-Ashi style source).
    AveragedPrice,
}

/// What the aggregator does with a tick whose bucket precedes the
/// in-progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateTickPolicy {
    /// Drop the tick; the in-progress bar is left untouched.
    #[default]
    Ignore,
    /// Treat any bucket mismatch as a boundary: close the in-progress bar
    /// and reopen at the tick's (earlier) bucket.
    CloseBar,
}

/// Parameters consumed by the core at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// ATR lookback (Wilder period).
    pub period: usize,
    /// ATR multiplier ("key value").
    pub sensitivity: f64,
    pub source_mode: SourceMode,
    pub bucket_width_ms: i64,
    pub late_ticks: LateTickPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            period: 10,
            sensitivity: 1.0,
            source_mode: SourceMode::Close,
            bucket_width_ms: 60_000,
            late_ticks: LateTickPolicy::Ignore,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period < 1 {
            return Err(ConfigError::InvalidPeriod(self.period));
        }
        if self.bucket_width_ms <= 0 {
            return Err(ConfigError::InvalidBucketWidth(self.bucket_width_ms));
        }
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            return Err(ConfigError::InvalidSensitivity(self.sensitivity));
        }
        Ok(())
    }

    /// Deterministic identity of the indicator parameters.
    ///
    /// BLAKE3 over the canonical JSON form. Persisted with every signal so
    /// records produced under different parameters can be told apart.
    pub fn fingerprint(&self) -> ParamsHash {
        let canonical = serde_json::json!({
            "period": self.period,
            "sensitivity": self.sensitivity,
            "source_mode": self.source_mode,
            "bucket_width_ms": self.bucket_width_ms,
        });
        ParamsHash(blake3::hash(canonical.to_string().as_bytes()).to_hex().to_string())
    }
}

/// Hex-encoded BLAKE3 hash of an [`EngineConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamsHash(pub String);

impl fmt::Display for ParamsHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
