//! Bar-driven signal state machines.

pub mod trailing_stop;

pub use trailing_stop::{SignalState, TrailingStopSignal};
