//! trailwatch core: tick aggregation, Wilder ATR, trailing-stop signals.
//!
//! Pipeline per symbol:
//! - `BarAggregator` folds ticks into fixed-width bars
//! - `TrailingStopSignal` runs the ATR trailing stop over each closed bar
//! - `SymbolEngine` ties the two together and returns typed events
//! - `EngineRegistry` owns one engine per symbol and relays events to sinks
//!
//! Everything below the registry is synchronous and free of I/O.

pub mod aggregation;
pub mod config;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod signals;
pub mod sink;

pub use aggregation::{BarAggregator, Ingest, LateTickPolicy};
pub use config::{ConfigError, EngineConfig, ParamsHash, SourceMode};
pub use domain::{Bar, EngineEvent, Side, Signal, Symbol, Trend};
pub use engine::{EngineRegistry, SymbolEngine};
pub use indicators::{true_range, Smoothed, WilderSmoother};
pub use signals::{SignalState, TrailingStopSignal};
pub use sink::{EventSink, SinkError, SymbolEvent};
