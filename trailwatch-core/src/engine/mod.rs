//! Live engines: per-symbol tick processing and the multi-symbol registry.
//!
//! A `SymbolEngine` turns ticks into closed bars and closed bars into
//! signals. The `EngineRegistry` owns one engine per symbol and relays the
//! resulting events to downstream sinks.

pub mod registry;
pub mod symbol_engine;

pub use registry::EngineRegistry;
pub use symbol_engine::SymbolEngine;
