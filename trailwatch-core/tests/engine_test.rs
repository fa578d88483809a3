//! End-to-end behaviour of the live engine: ticks in, bars and signals out.

use std::sync::{Arc, Mutex};

use trailwatch_core::{
    Bar, EngineConfig, EngineEvent, EngineRegistry, EventSink, LateTickPolicy, Side, SinkError,
    Smoothed, SymbolEngine, SymbolEvent, TrailingStopSignal, Trend, WilderSmoother,
};

const MIN: i64 = 60_000;

fn flat_bar(i: i64, price: f64) -> Bar {
    Bar::from_tick(i * MIN, price, None)
}

fn cfg(period: usize, sensitivity: f64) -> EngineConfig {
    EngineConfig {
        period,
        sensitivity,
        ..EngineConfig::default()
    }
}

// ── Smoother ─────────────────────────────────────────────────────────

#[test]
fn smoother_seed_and_first_recursive_step() {
    let samples = [1.5, 2.0, 0.5, 3.0, 1.0];
    let mut atr = WilderSmoother::new(samples.len()).unwrap();
    let mut last = Smoothed::Unseeded;
    for tr in samples {
        last = atr.update(tr);
    }
    let seed = samples.iter().sum::<f64>() / samples.len() as f64;
    assert_eq!(last, Smoothed::Seeded(seed));

    let next = atr.update(4.0);
    assert_eq!(next, Smoothed::Seeded((seed * 4.0 + 4.0) / 5.0));
}

// ── Signal state machine ─────────────────────────────────────────────

#[test]
fn constant_series_shorter_than_period_never_signals() {
    let mut ut = TrailingStopSignal::new(&cfg(14, 1.0)).unwrap();
    for i in 0..13 {
        assert!(ut.update(&flat_bar(i, 250.0)).is_none());
    }
    assert!(!ut.is_seeded());
    assert_eq!(ut.stop(), 0.0);
}

// The stop seeds on the period-th bar, so it already sits at 100 when the
// eleventh bar arrives. Worked figures that start that bar from a stop of 0
// (stop 101, no signal) assume a later seed and do not apply here.
#[test]
fn ten_flat_bars_then_breakout_buys() {
    let mut ut = TrailingStopSignal::new(&cfg(10, 1.0)).unwrap();
    for i in 0..10 {
        assert!(ut.update(&flat_bar(i, 100.0)).is_none());
    }
    assert!(ut.is_seeded());
    assert_eq!(ut.stop(), 100.0);

    let bar = flat_bar(10, 101.0);
    assert!(bar.is_sane());
    let sig = ut.update(&bar).expect("close above the seeded stop");
    assert_eq!(sig.side, Side::Buy);
    assert_eq!(sig.price, 101.0);
    assert!((sig.stop_level - 100.9).abs() < 1e-9);
    assert!((ut.stop() - 100.9).abs() < 1e-9);
}

#[test]
fn round_trip_buy_then_sell() {
    let mut ut = TrailingStopSignal::new(&cfg(3, 1.0)).unwrap();
    let mut signals = Vec::new();
    let closes = [
        100.0, 100.0, 100.0, // seed
        95.0, 90.0, 88.0, // fall through the stop
        95.0, 104.0, 110.0, // recover above it
    ];
    for (i, c) in closes.iter().enumerate() {
        let bar = Bar {
            open_time: i as i64 * MIN,
            open: *c,
            high: c + 1.0,
            low: c - 1.0,
            close: *c,
            volume: None,
        };
        if let Some(sig) = ut.update(&bar) {
            signals.push(sig);
        }
    }
    let sides: Vec<Side> = signals.iter().map(|s| s.side).collect();
    assert_eq!(sides, vec![Side::Sell, Side::Buy]);
    assert_eq!(ut.trend(), Trend::Long);
    assert!(signals[1].stop_level < signals[1].price);
}

// ── Aggregation through the engine ───────────────────────────────────

#[test]
fn two_ticks_same_bucket_then_one_close() {
    let mut engine = SymbolEngine::new(&EngineConfig::default()).unwrap();
    assert!(engine.on_tick(100.0, 120_000).is_empty());
    assert!(engine.on_tick(102.0, 150_000).is_empty());

    let events = engine.on_tick(101.0, 180_000);
    let bars: Vec<&Bar> = events.iter().filter_map(EngineEvent::as_bar).collect();
    assert_eq!(bars.len(), 1);
    let closed = bars[0];
    assert_eq!(closed.open_time, 120_000);
    assert_eq!(
        (closed.open, closed.high, closed.low, closed.close),
        (100.0, 102.0, 100.0, 102.0)
    );
}

#[test]
fn warmup_then_tick_in_last_bucket_is_continuation() {
    let mut engine = SymbolEngine::new(&cfg(5, 2.0)).unwrap();
    let history: Vec<Bar> = (0..20).map(|i| flat_bar(i, 50.0 + i as f64)).collect();
    engine.warmup(&history);

    let events = engine.on_tick(70.0, 19 * MIN + 59_999);
    assert!(events.iter().all(|e| e.as_bar().is_none()));
    assert_eq!(engine.current_bar().unwrap().high, 70.0);
}

#[test]
fn late_tick_policy_is_configurable() {
    let mut ignore = SymbolEngine::new(&EngineConfig::default()).unwrap();
    ignore.on_tick(10.0, 3 * MIN);
    assert!(ignore.on_tick(9.0, 2 * MIN).is_empty());
    assert_eq!(ignore.current_bar().unwrap().open_time, 3 * MIN);

    let mut close_bar = SymbolEngine::new(&EngineConfig {
        late_ticks: LateTickPolicy::CloseBar,
        ..EngineConfig::default()
    })
    .unwrap();
    close_bar.on_tick(10.0, 3 * MIN);
    let events = close_bar.on_tick(9.0, 2 * MIN);
    assert_eq!(events.len(), 1);
    assert_eq!(close_bar.current_bar().unwrap().open_time, 2 * MIN);
}

// ── Registry relay ───────────────────────────────────────────────────

#[derive(Default)]
struct Collect(Mutex<Vec<SymbolEvent>>);

impl EventSink for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    fn handle(&self, event: &SymbolEvent) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[test]
fn symbols_are_independent() {
    let sink = Arc::new(Collect::default());
    let reg = EngineRegistry::new(cfg(2, 1.0)).unwrap().with_sink(sink.clone());

    for i in 0..6 {
        reg.on_tick("AAA", 100.0 + i as f64, i * MIN);
    }
    reg.on_tick("BBB", 5.0, 0);

    assert!(reg.state("AAA").unwrap().previous_close.is_some());
    assert_eq!(reg.state("BBB").unwrap().previous_close, None);
    assert!(sink.0.lock().unwrap().iter().all(|e| e.symbol == "AAA"));
}

#[test]
fn parallel_ticks_across_symbols() {
    let reg = Arc::new(EngineRegistry::new(cfg(3, 1.0)).unwrap());
    let handles: Vec<_> = ["S1", "S2", "S3", "S4"]
        .into_iter()
        .map(|sym| {
            let reg = Arc::clone(&reg);
            std::thread::spawn(move || {
                let mut closed = 0;
                for i in 0..200 {
                    let price = 100.0 + ((i as f64) * 0.3).sin() * 5.0;
                    closed += reg
                        .on_tick(sym, price, i * MIN)
                        .iter()
                        .filter(|e| e.as_bar().is_some())
                        .count();
                }
                closed
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), 199);
    }
    assert_eq!(reg.len(), 4);

    // Same deterministic input per symbol -> identical state.
    let s1 = reg.state("S1").unwrap();
    for sym in ["S2", "S3", "S4"] {
        assert_eq!(reg.state(sym).unwrap(), s1);
    }
}
