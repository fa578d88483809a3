//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period), seeded with the plain
//! mean of the first `period` samples. Streaming: one sample per closed bar.

use crate::config::ConfigError;

/// True range of one bar against the previous close.
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Output of the smoother: either still warming up or a defined value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Smoothed {
    Unseeded,
    Seeded(f64),
}

impl Smoothed {
    pub fn value(self) -> Option<f64> {
        match self {
            Smoothed::Unseeded => None,
            Smoothed::Seeded(v) => Some(v),
        }
    }
}

/// Recursive Wilder smoother.
#[derive(Debug, Clone)]
pub struct WilderSmoother {
    period: usize,
    sample_count: usize,
    running_sum: f64,
    value: Smoothed,
}

impl WilderSmoother {
    pub fn new(period: usize) -> Result<Self, ConfigError> {
        if period < 1 {
            return Err(ConfigError::InvalidPeriod(period));
        }
        Ok(Self {
            period,
            sample_count: 0,
            running_sum: 0.0,
            value: Smoothed::Unseeded,
        })
    }

    /// Feed one true-range sample.
    ///
    /// The call that brings the sample count to `period` returns the seed.
    pub fn update(&mut self, tr: f64) -> Smoothed {
        let n = self.period as f64;
        self.value = match self.value {
            Smoothed::Unseeded => {
                self.running_sum += tr;
                self.sample_count += 1;
                if self.sample_count == self.period {
                    Smoothed::Seeded(self.running_sum / n)
                } else {
                    Smoothed::Unseeded
                }
            }
            Smoothed::Seeded(prev) => {
                self.sample_count += 1;
                Smoothed::Seeded((prev * (n - 1.0) + tr) / n)
            }
        };
        self.value
    }

    pub fn value(&self) -> Smoothed {
        self.value
    }

    pub fn is_seeded(&self) -> bool {
        matches!(self.value, Smoothed::Seeded(_))
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Samples consumed so far, including post-seed updates.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
}
