//! Domain types for trailwatch

pub mod bar;
pub mod signal;

pub use bar::Bar;
pub use signal::{EngineEvent, Side, Signal, Trend};

/// Symbol type alias
pub type Symbol = String;
