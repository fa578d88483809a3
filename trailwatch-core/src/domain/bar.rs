//! One fixed-width OHLC bucket.

use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol over one bucket.
///
/// `open_time` is epoch milliseconds aligned to the bucket start.
/// Volume is optional because quote feeds often carry price only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Bar {
    /// A bar opened by a single tick: open = high = low = close = price.
    pub fn from_tick(open_time: i64, price: f64, size: Option<f64>) -> Self {
        Self {
            open_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: size,
        }
    }

    /// Fold a same-bucket tick into the bar.
    pub fn absorb(&mut self, price: f64, size: Option<f64>) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        if let Some(size) = size {
            self.volume = Some(self.volume.unwrap_or(0.0) + size);
        }
    }

    /// Mean of open, high, low, close.
    pub fn ohlc4(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }

    /// Returns true if any OHLC field is non-finite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// `low <= open, close <= high` and every field finite.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            open_time: 1_700_000_040_000,
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: Some(50_000.0),
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 97.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn absorb_tracks_extremes_and_volume() {
        let mut bar = Bar::from_tick(0, 100.0, Some(2.0));
        bar.absorb(103.0, Some(1.0));
        bar.absorb(99.0, None);
        bar.absorb(101.0, Some(4.0));
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.high, 103.0);
        assert_eq!(bar.low, 99.0);
        assert_eq!(bar.close, 101.0);
        assert_eq!(bar.volume, Some(7.0));
        assert!(bar.is_sane());
    }

    #[test]
    fn ohlc4_is_plain_mean() {
        assert_eq!(sample_bar().ohlc4(), (100.0 + 105.0 + 98.0 + 103.0) / 4.0);
    }

    #[test]
    fn serializes_with_short_keys() {
        let json = serde_json::to_string(&Bar::from_tick(60_000, 1.5, None)).unwrap();
        assert_eq!(json, r#"{"t":60000,"o":1.5,"h":1.5,"l":1.5,"c":1.5}"#);
        let back: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(back.volume, None);
    }
}
