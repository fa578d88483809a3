//! Fan-out of live updates to connected subscribers.
//!
//! Each subscriber owns the receiving end of an unbounded channel. A send
//! failure means the subscriber has gone away; it is pruned on the spot.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use trailwatch_core::{Bar, EngineEvent, EventSink, Signal, SinkError, SymbolEvent};

use crate::alerts::Notice;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HubMessage {
    Price { symbol: String, price: f64, ts: i64 },
    Bar { symbol: String, bar: Bar },
    Signal { symbol: String, signal: Signal },
    Notify(Notice),
    Snapshot { watchlist: Vec<String> },
}

impl HubMessage {
    pub fn from_event(event: &SymbolEvent) -> Self {
        let symbol = event.symbol.clone();
        match event.event {
            EngineEvent::BarClosed(bar) => HubMessage::Bar { symbol, bar },
            EngineEvent::Signal(signal) => HubMessage::Signal { symbol, signal },
        }
    }
}

#[derive(Default)]
pub struct BroadcastHub {
    subscribers: Mutex<Vec<Sender<HubMessage>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<HubMessage> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Subscribe with `greeting` queued as the first message. Only the new
    /// subscriber receives it.
    pub fn subscribe_with(&self, greeting: HubMessage) -> Receiver<HubMessage> {
        let (tx, rx) = mpsc::channel();
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        if tx.send(greeting).is_ok() {
            subs.push(tx);
        }
        rx
    }

    /// Send `msg` to every live subscriber. Returns how many received it.
    pub fn publish(&self, msg: &HubMessage) -> usize {
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|tx| tx.send(msg.clone()).is_ok());
        if subs.len() < before {
            debug!(pruned = before - subs.len(), "dropped disconnected subscribers");
        }
        subs.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl EventSink for BroadcastHub {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn handle(&self, event: &SymbolEvent) -> Result<(), SinkError> {
        self.publish(&HubMessage::from_event(event));
        Ok(())
    }
}
