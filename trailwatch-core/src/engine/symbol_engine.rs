//! Per-instrument engine: one aggregator feeding one trailing-stop signal.

use crate::aggregation::BarAggregator;
use crate::config::{ConfigError, EngineConfig};
use crate::domain::{Bar, EngineEvent, Signal};
use crate::signals::{SignalState, TrailingStopSignal};

#[derive(Debug, Clone)]
pub struct SymbolEngine {
    aggregator: BarAggregator,
    signal: TrailingStopSignal,
    late_ticks: u64,
    out_of_range_ticks: u64,
}

impl SymbolEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            aggregator: BarAggregator::new(config)?,
            signal: TrailingStopSignal::new(config)?,
            late_ticks: 0,
            out_of_range_ticks: 0,
        })
    }

    /// Seed the indicator from already-closed bars, oldest first.
    ///
    /// Bars go straight to the signal, bypassing the aggregator. Signals
    /// produced while seeding are returned, not relayed; the caller decides
    /// whether they matter. The last bar becomes the in-progress bar so a live
    /// tick in the same bucket continues it instead of opening a duplicate.
    pub fn warmup(&mut self, history: &[Bar]) -> Vec<Signal> {
        let signals = history
            .iter()
            .filter_map(|bar| self.signal.update(bar))
            .collect();
        if let Some(last) = history.last() {
            self.aggregator.set_current(Some(*last));
        }
        signals
    }

    pub fn on_tick(&mut self, price: f64, ts: i64) -> Vec<EngineEvent> {
        self.on_tick_sized(price, ts, None)
    }

    /// Feed one live tick. Events come out as `BarClosed` then `Signal`.
    pub fn on_tick_sized(&mut self, price: f64, ts: i64, size: Option<f64>) -> Vec<EngineEvent> {
        let ingest = self.aggregator.ingest_sized(price, ts, size);
        if ingest.late {
            self.late_ticks += 1;
        }
        if ingest.out_of_range {
            self.out_of_range_ticks += 1;
        }
        let Some(closed) = ingest.closed else {
            return Vec::new();
        };

        let mut events = Vec::with_capacity(2);
        events.push(EngineEvent::BarClosed(closed));
        if let Some(sig) = self.signal.update(&closed) {
            events.push(EngineEvent::Signal(sig));
        }
        events
    }

    pub fn state(&self) -> SignalState {
        self.signal.state()
    }

    pub fn current_bar(&self) -> Option<&Bar> {
        self.aggregator.current()
    }

    pub fn is_seeded(&self) -> bool {
        self.signal.is_seeded()
    }

    /// Out-of-order ticks dropped under `LateTickPolicy::Ignore`.
    pub fn late_ticks(&self) -> u64 {
        self.late_ticks
    }

    /// Ticks dropped because their timestamp has no representable bucket.
    pub fn out_of_range_ticks(&self) -> u64 {
        self.out_of_range_ticks
    }
}
