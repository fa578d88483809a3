//! Wiring: one registry, its sinks, and the replay driver.
//!
//! [`Relay::from_config`] builds the registry and attaches the signal store,
//! the notification sink and the broadcast hub. History primes engines
//! without touching any sink; ticks are replayed per symbol, in parallel
//! across symbols.

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;
use tracing::{debug, info};

use trailwatch_core::{Bar, EngineEvent, EngineRegistry, Signal};

use crate::alerts::{Mailer, NotificationSink};
use crate::broadcast::{BroadcastHub, HubMessage};
use crate::config::{AppConfig, AppConfigError};
use crate::feed::{group_by_symbol, Tick};
use crate::store::SignalStore;
use crate::watchlist::Watchlist;

/// Result of priming one symbol from history.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimeSummary {
    pub symbol: String,
    pub bars: usize,
    /// Signals that occurred inside the history window.
    pub warmup_signals: Vec<Signal>,
}

/// Result of replaying one symbol's ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySummary {
    pub symbol: String,
    pub ticks: usize,
    pub bars_closed: usize,
    pub signals: Vec<Signal>,
}

pub struct Relay {
    registry: Arc<EngineRegistry>,
    store: Arc<SignalStore>,
    hub: Arc<BroadcastHub>,
    watchlist: Mutex<Watchlist>,
    parallel: bool,
}

impl Relay {
    pub fn from_config(config: &AppConfig, mailer: Arc<dyn Mailer>) -> Result<Self, AppConfigError> {
        let hub = Arc::new(BroadcastHub::new());
        let store = Arc::new(SignalStore::new(
            config.store.path.clone(),
            config.timeframe(),
            config.engine,
        ));
        let notifications = Arc::new(
            NotificationSink::new(config.alerts.clone(), config.smtp.clone(), mailer)
                .with_hub(Arc::clone(&hub)),
        );

        let registry = EngineRegistry::new(config.engine)?
            .with_sink(store.clone())
            .with_sink(notifications)
            .with_sink(hub.clone());

        let watchlist = Watchlist::from_symbols(&config.watchlist).with_hub(Arc::clone(&hub));
        for symbol in watchlist.symbols() {
            registry.ensure(symbol);
        }

        info!(
            params = %config.engine.fingerprint(),
            timeframe = %config.timeframe(),
            watching = watchlist.len(),
            alerts = config.alerts.len(),
            "relay ready"
        );

        Ok(Self {
            registry: Arc::new(registry),
            store,
            hub,
            watchlist: Mutex::new(watchlist),
            parallel: true,
        })
    }

    /// Enables or disables parallel replay across symbols.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &SignalStore {
        &self.store
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn watchlist(&self) -> MutexGuard<'_, Watchlist> {
        self.watchlist.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect a new subscriber. Its first message is the current watch list.
    pub fn subscribe(&self) -> Receiver<HubMessage> {
        let list = self.watchlist();
        self.hub.subscribe_with(list.snapshot())
    }

    /// Start following `symbol` and create its engine.
    pub fn watch(&self, symbol: &str) -> bool {
        let mut list = self.watchlist();
        let added = list.add(symbol);
        if added {
            if let Some(sym) = list.symbols().last() {
                self.registry.ensure(sym);
            }
        }
        added
    }

    /// Stop following `symbol` and drop its engine.
    pub fn unwatch(&self, symbol: &str) -> bool {
        let removed = self.watchlist().remove(symbol);
        if removed {
            if let Some(sym) = crate::watchlist::normalize_symbol(symbol) {
                self.registry.evict(&sym);
            }
        }
        removed
    }

    /// Warm every symbol in `history` up. Nothing is persisted or broadcast.
    pub fn prime_all(&self, history: &BTreeMap<String, Vec<Bar>>) -> Vec<PrimeSummary> {
        history
            .iter()
            .map(|(symbol, bars)| {
                let warmup_signals = self.registry.prime(symbol, bars);
                PrimeSummary {
                    symbol: symbol.clone(),
                    bars: bars.len(),
                    warmup_signals,
                }
            })
            .collect()
    }

    /// Replay validated ticks. Per-symbol order is preserved; symbols run
    /// concurrently when parallelism is on. Summaries are sorted by symbol.
    pub fn replay(&self, ticks: Vec<Tick>) -> Vec<ReplaySummary> {
        let groups: Vec<(String, Vec<Tick>)> = group_by_symbol(ticks).into_iter().collect();
        debug!(symbols = groups.len(), parallel = self.parallel, "replaying ticks");

        if self.parallel {
            groups
                .par_iter()
                .map(|(symbol, ticks)| self.replay_symbol(symbol, ticks))
                .collect()
        } else {
            groups
                .iter()
                .map(|(symbol, ticks)| self.replay_symbol(symbol, ticks))
                .collect()
        }
    }

    fn replay_symbol(&self, symbol: &str, ticks: &[Tick]) -> ReplaySummary {
        let mut summary = ReplaySummary {
            symbol: symbol.to_string(),
            ticks: ticks.len(),
            bars_closed: 0,
            signals: Vec::new(),
        };

        for tick in ticks {
            self.hub.publish(&HubMessage::Price {
                symbol: symbol.to_string(),
                price: tick.price,
                ts: tick.ts,
            });
            for event in self.registry.on_tick_sized(symbol, tick.price, tick.ts, tick.size) {
                match event {
                    EngineEvent::BarClosed(_) => summary.bars_closed += 1,
                    EngineEvent::Signal(sig) => summary.signals.push(sig),
                }
            }
        }

        info!(
            symbol,
            ticks = summary.ticks,
            bars = summary.bars_closed,
            signals = summary.signals.len(),
            "replay finished"
        );
        summary
    }
}
