//! Signal, trend and engine event types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::bar::Bar;

/// Direction of an emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position state tracked alongside the trailing stop.
///
/// Informational only: signals are derived from stop crossovers, not from
/// this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    #[default]
    Flat,
    Long,
    Short,
}

/// A BUY/SELL crossover produced on a closed bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub side: Side,
    /// Open time of the bar that produced the signal (epoch ms).
    pub time: i64,
    /// Indicator source value, not necessarily the raw close.
    pub price: f64,
    pub stop_level: f64,
}

/// Ordered output of a single engine call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    BarClosed(Bar),
    Signal(Signal),
}

impl EngineEvent {
    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            EngineEvent::Signal(sig) => Some(sig),
            EngineEvent::BarClosed(_) => None,
        }
    }

    pub fn as_bar(&self) -> Option<&Bar> {
        match self {
            EngineEvent::BarClosed(bar) => Some(bar),
            EngineEvent::Signal(_) => None,
        }
    }
}
