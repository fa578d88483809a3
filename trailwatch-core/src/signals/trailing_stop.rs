//! ATR trailing-stop signal ("UT Bot" style).
//!
//! Stateful and strictly sequential: one `update` per closed bar, oldest first.
//! The stop ratchets in the direction of the established trend and flips to the
//! other side of price when the source crosses it. BUY/SELL fire on crossovers
//! of the source over the stop.
//!
//! Two phases:
//! - Unseeded: the ATR has fewer than `period` samples. Bars only update
//!   `previous_close` / `previous_source`; the stop never moves and no signal
//!   is produced, however far price travels.
//! - Active: every bar runs the four-way ratchet and the crossover checks.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EngineConfig, SourceMode};
use crate::domain::{Bar, Side, Signal, Trend};
use crate::indicators::atr::{true_range, Smoothed, WilderSmoother};

/// Read-only snapshot of the per-symbol indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    pub previous_close: Option<f64>,
    pub previous_source: Option<f64>,
    pub stop: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone)]
pub struct TrailingStopSignal {
    sensitivity: f64,
    source_mode: SourceMode,
    atr: WilderSmoother,
    previous_close: Option<f64>,
    previous_source: Option<f64>,
    stop: f64,
    trend: Trend,
}

impl TrailingStopSignal {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            sensitivity: config.sensitivity,
            source_mode: config.source_mode,
            atr: WilderSmoother::new(config.period)?,
            previous_close: None,
            previous_source: None,
            stop: 0.0,
            trend: Trend::Flat,
        })
    }

    fn source(&self, bar: &Bar) -> f64 {
        match self.source_mode {
            SourceMode::Close => bar.close,
            SourceMode::AveragedPrice => bar.ohlc4(),
        }
    }

    /// Advance the state machine by one closed bar.
    pub fn update(&mut self, bar: &Bar) -> Option<Signal> {
        let src = self.source(bar);
        let prev_close = self.previous_close.unwrap_or(bar.close);
        let tr = true_range(bar.high, bar.low, prev_close);

        let atr = match self.atr.update(tr) {
            Smoothed::Unseeded => {
                self.previous_source = Some(src);
                self.previous_close = Some(bar.close);
                return None;
            }
            Smoothed::Seeded(v) => v,
        };

        let n_loss = self.sensitivity * atr;
        let prev_stop = self.stop;
        let prev_src = self.previous_source.unwrap_or(src);

        // Branch order and strict/non-strict comparisons are load-bearing at
        // src == prev_stop.
        self.stop = if src > prev_stop && prev_src > prev_stop {
            prev_stop.max(src - n_loss)
        } else if src < prev_stop && prev_src < prev_stop {
            prev_stop.min(src + n_loss)
        } else if src > prev_stop {
            src - n_loss
        } else {
            src + n_loss
        };

        if prev_src < prev_stop && src > prev_stop {
            self.trend = Trend::Long;
        } else if prev_src > prev_stop && src < prev_stop {
            self.trend = Trend::Short;
        }

        let buy = src > self.stop && prev_src <= prev_stop;
        let sell = src < self.stop && prev_src >= prev_stop;

        self.previous_source = Some(src);
        self.previous_close = Some(bar.close);

        let side = if buy {
            Side::Buy
        } else if sell {
            Side::Sell
        } else {
            return None;
        };
        Some(Signal {
            side,
            time: bar.open_time,
            price: src,
            stop_level: self.stop,
        })
    }

    pub fn state(&self) -> SignalState {
        SignalState {
            previous_close: self.previous_close,
            previous_source: self.previous_source,
            stop: self.stop,
            trend: self.trend,
        }
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn trend(&self) -> Trend {
        self.trend
    }

    pub fn atr(&self) -> Smoothed {
        self.atr.value()
    }

    pub fn is_seeded(&self) -> bool {
        self.atr.is_seeded()
    }
}
