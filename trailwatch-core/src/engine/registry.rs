//! Multi-symbol registry: symbol → engine, plus relay to sinks.
//!
//! Locking: the map is behind an `RwLock` held only long enough to look up or
//! insert an entry. Each engine sits behind its own `Mutex`, so ticks for
//! different symbols never contend. Sinks run after the engine lock is
//! released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::domain::{Bar, EngineEvent, Signal, Symbol};
use crate::engine::symbol_engine::SymbolEngine;
use crate::signals::SignalState;
use crate::sink::{EventSink, SymbolEvent};

type EngineHandle = Arc<Mutex<SymbolEngine>>;

fn lock_engine(handle: &EngineHandle) -> MutexGuard<'_, SymbolEngine> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct EngineRegistry {
    config: EngineConfig,
    /// Fresh engine cloned for every new symbol.
    prototype: SymbolEngine,
    engines: RwLock<HashMap<Symbol, EngineHandle>>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EngineRegistry {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let prototype = SymbolEngine::new(&config)?;
        Ok(Self {
            config,
            prototype,
            engines: RwLock::new(HashMap::new()),
            sinks: Vec::new(),
        })
    }

    /// Register a sink. Events reach sinks in registration order.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the engine for `symbol`, creating it if absent.
    pub fn ensure(&self, symbol: &str) -> EngineHandle {
        if let Some(handle) = self
            .engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
        {
            return Arc::clone(handle);
        }

        let mut engines = self.engines.write().unwrap_or_else(PoisonError::into_inner);
        let handle = engines.entry(symbol.to_string()).or_insert_with(|| {
            debug!(symbol, "creating engine");
            Arc::new(Mutex::new(self.prototype.clone()))
        });
        Arc::clone(handle)
    }

    /// Warm up `symbol` from closed history bars, oldest first.
    ///
    /// Signals produced while seeding are returned to the caller and never
    /// relayed to sinks.
    pub fn prime(&self, symbol: &str, history: &[Bar]) -> Vec<Signal> {
        let handle = self.ensure(symbol);
        let signals = lock_engine(&handle).warmup(history);
        debug!(symbol, bars = history.len(), seeding_signals = signals.len(), "primed engine");
        signals
    }

    pub fn on_tick(&self, symbol: &str, price: f64, ts: i64) -> Vec<EngineEvent> {
        self.on_tick_sized(symbol, price, ts, None)
    }

    /// Feed a live tick and relay every resulting event to the sinks.
    ///
    /// The engine mutation is complete before any sink runs; sink failures
    /// are logged and do not affect engine state or the returned events.
    pub fn on_tick_sized(
        &self,
        symbol: &str,
        price: f64,
        ts: i64,
        size: Option<f64>,
    ) -> Vec<EngineEvent> {
        let handle = self.ensure(symbol);
        let (events, late, out_of_range) = {
            let mut engine = lock_engine(&handle);
            let before = (engine.late_ticks(), engine.out_of_range_ticks());
            let events = engine.on_tick_sized(price, ts, size);
            (
                events,
                engine.late_ticks() > before.0,
                engine.out_of_range_ticks() > before.1,
            )
        };
        if late {
            debug!(symbol, ts, "late tick dropped");
        }
        if out_of_range {
            warn!(symbol, ts, "tick timestamp out of range, dropped");
        }
        for event in &events {
            self.relay(symbol, event);
        }
        events
    }

    fn relay(&self, symbol: &str, event: &EngineEvent) {
        if self.sinks.is_empty() {
            return;
        }
        let tagged = SymbolEvent {
            symbol: symbol.to_string(),
            event: *event,
        };
        for sink in &self.sinks {
            if let Err(e) = sink.handle(&tagged) {
                warn!(sink = sink.name(), symbol, error = %e, "sink failed");
            }
        }
    }

    /// Remove `symbol`'s engine. The only way an engine is ever dropped.
    pub fn evict(&self, symbol: &str) -> bool {
        self.engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(symbol)
            .is_some()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(symbol)
    }

    /// Registered symbols, sorted.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self
            .engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        symbols.sort();
        symbols
    }

    pub fn state(&self, symbol: &str) -> Option<SignalState> {
        let handle = self
            .engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .cloned()?;
        let state = lock_engine(&handle).state();
        Some(state)
    }

    /// Bar currently being built for `symbol`.
    pub fn current_bar(&self, symbol: &str) -> Option<Bar> {
        let handle = self
            .engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .cloned()?;
        let bar = lock_engine(&handle).current_bar().copied();
        bar
    }

    pub fn len(&self) -> usize {
        self.engines.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
