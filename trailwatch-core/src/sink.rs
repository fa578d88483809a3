//! Downstream event sinks.
//!
//! The registry is the only component that knows sinks exist. Each emitted
//! event is handed to every sink in registration order; a sink error is
//! logged by the registry and otherwise ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{EngineEvent, Symbol};

/// An engine event tagged with the instrument that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEvent {
    pub symbol: Symbol,
    #[serde(flatten)]
    pub event: EngineEvent,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink serialization error: {0}")]
    Serialize(String),

    #[error("delivery failed via {channel}: {reason}")]
    Delivery { channel: String, reason: String },
}

/// Receiver of relayed engine events (persistence, notification, broadcast).
///
/// Implementations must not block for long: they run on the tick path, after
/// the symbol's engine lock has been released.
pub trait EventSink: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    fn handle(&self, event: &SymbolEvent) -> Result<(), SinkError>;
}
