//! Tick → fixed-width bar aggregation.
//!
//! A bar covers `[bucket, bucket + width)` where
//! `bucket = floor(ts / width) * width`. A bar is emitted as closed when the
//! first tick of a later bucket arrives; there is no timer-driven close.

use crate::config::{ConfigError, EngineConfig, LateTickPolicy};
use crate::domain::Bar;

/// Start of the bucket containing `ts` (floor division, also for negative ts).
///
/// `None` when the bucket start is not representable as an `i64`.
pub fn bucket_start(ts: i64, width: i64) -> Option<i64> {
    ts.checked_div_euclid(width)?.checked_mul(width)
}

/// Result of ingesting one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ingest {
    /// The previous in-progress bar, if this tick crossed a boundary.
    pub closed: Option<Bar>,
    /// The tick belonged to a bucket before the in-progress bar and was dropped.
    pub late: bool,
    /// The tick's timestamp has no representable bucket; it was dropped.
    pub out_of_range: bool,
}

#[derive(Debug, Clone)]
pub struct BarAggregator {
    width: i64,
    late_ticks: LateTickPolicy,
    current: Option<Bar>,
}

impl BarAggregator {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            width: config.bucket_width_ms,
            late_ticks: config.late_ticks,
            current: None,
        })
    }

    pub fn ingest(&mut self, price: f64, ts: i64) -> Ingest {
        self.ingest_sized(price, ts, None)
    }

    /// Ingest a tick carrying an optional traded size (summed into volume).
    pub fn ingest_sized(&mut self, price: f64, ts: i64, size: Option<f64>) -> Ingest {
        let Some(bucket) = bucket_start(ts, self.width) else {
            return Ingest {
                out_of_range: true,
                ..Ingest::default()
            };
        };

        let Some(cur) = self.current.as_mut() else {
            self.current = Some(Bar::from_tick(bucket, price, size));
            return Ingest::default();
        };

        if bucket == cur.open_time {
            cur.absorb(price, size);
            return Ingest::default();
        }

        if bucket < cur.open_time && self.late_ticks == LateTickPolicy::Ignore {
            return Ingest {
                late: true,
                ..Ingest::default()
            };
        }

        let closed = self.current.replace(Bar::from_tick(bucket, price, size));
        Ingest {
            closed,
            ..Ingest::default()
        }
    }

    /// The bar being built, if any.
    pub fn current(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    /// Replace the in-progress bar (used after warm-up from history).
    pub fn set_current(&mut self, bar: Option<Bar>) {
        self.current = bar;
    }

    pub fn bucket_width_ms(&self) -> i64 {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: i64 = 60_000;

    fn agg(policy: LateTickPolicy) -> BarAggregator {
        BarAggregator::new(&EngineConfig {
            late_ticks: policy,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn bucket_alignment() {
        assert_eq!(bucket_start(0, MIN), Some(0));
        assert_eq!(bucket_start(59_999, MIN), Some(0));
        assert_eq!(bucket_start(60_000, MIN), Some(60_000));
        assert_eq!(bucket_start(1_700_000_012_345, MIN), Some(1_699_999_980_000));
        assert_eq!(bucket_start(-1, MIN), Some(-60_000));
    }

    #[test]
    fn extreme_timestamps_have_no_bucket() {
        assert_eq!(bucket_start(i64::MIN, MIN), None);
        assert_eq!(bucket_start(i64::MIN + 1, MIN), None);
        assert_eq!(bucket_start(i64::MAX, MIN), Some(i64::MAX - i64::MAX % MIN));
    }

    #[test]
    fn out_of_range_tick_dropped_without_touching_bar() {
        let mut a = agg(LateTickPolicy::Ignore);
        let out = a.ingest(1.0, i64::MIN);
        assert!(out.out_of_range);
        assert!(out.closed.is_none());
        assert!(a.current().is_none());

        a.ingest(10.0, 0);
        let out = a.ingest(1.0, i64::MIN);
        assert!(out.out_of_range && !out.late);
        assert_eq!(a.current().map(|b| b.close), Some(10.0));
    }

    #[test]
    fn rejects_non_positive_width() {
        let cfg = EngineConfig {
            bucket_width_ms: 0,
            ..EngineConfig::default()
        };
        assert_eq!(
            BarAggregator::new(&cfg).unwrap_err(),
            ConfigError::InvalidBucketWidth(0)
        );
    }

    #[test]
    fn first_tick_opens_bar() {
        let mut a = agg(LateTickPolicy::Ignore);
        let out = a.ingest(100.0, 90_500);
        assert_eq!(out, Ingest::default());
        let cur = a.current().unwrap();
        assert_eq!(cur.open_time, 60_000);
        assert_eq!((cur.open, cur.high, cur.low, cur.close), (100.0, 100.0, 100.0, 100.0));
    }

    #[test]
    fn same_bucket_updates_then_next_bucket_closes_once() {
        let mut a = agg(LateTickPolicy::Ignore);
        assert!(a.ingest(100.0, 1_000).closed.is_none());
        assert!(a.ingest(103.0, 30_000).closed.is_none());
        assert!(a.ingest(99.5, 59_999).closed.is_none());

        let closed = a.ingest(101.0, 60_000).closed.expect("boundary crossed");
        assert_eq!(closed.open_time, 0);
        assert_eq!(closed.open, 100.0);
        assert_eq!(closed.high, 103.0);
        assert_eq!(closed.low, 99.5);
        assert_eq!(closed.close, 99.5);

        let cur = a.current().unwrap();
        assert_eq!(cur.open_time, 60_000);
        assert_eq!(cur.open, 101.0);
    }

    #[test]
    fn gap_of_several_buckets_closes_single_bar() {
        let mut a = agg(LateTickPolicy::Ignore);
        a.ingest(10.0, 0);
        let out = a.ingest(11.0, 5 * MIN + 10);
        assert_eq!(out.closed.map(|b| b.open_time), Some(0));
        assert_eq!(a.current().unwrap().open_time, 5 * MIN);
    }

    #[test]
    fn late_tick_ignored_by_default() {
        let mut a = agg(LateTickPolicy::Ignore);
        a.ingest(10.0, 2 * MIN);
        a.ingest(12.0, 2 * MIN + 5);
        let out = a.ingest(50.0, MIN + 30_000);
        assert!(out.late);
        assert!(out.closed.is_none());
        let cur = a.current().unwrap();
        assert_eq!(cur.open_time, 2 * MIN);
        assert_eq!(cur.high, 12.0);
        assert_eq!(cur.close, 12.0);
    }

    #[test]
    fn late_tick_closes_bar_under_close_bar_policy() {
        let mut a = agg(LateTickPolicy::CloseBar);
        a.ingest(10.0, 2 * MIN);
        let out = a.ingest(50.0, MIN + 30_000);
        assert!(!out.late);
        assert_eq!(out.closed.map(|b| b.open_time), Some(2 * MIN));
        assert_eq!(a.current().unwrap().open_time, MIN);
        assert_eq!(a.current().unwrap().close, 50.0);
    }

    #[test]
    fn volume_accumulates_when_sizes_present() {
        let mut a = agg(LateTickPolicy::Ignore);
        a.ingest_sized(10.0, 0, Some(3.0));
        a.ingest_sized(10.5, 1, Some(2.0));
        let closed = a.ingest_sized(11.0, MIN, Some(1.0)).closed.unwrap();
        assert_eq!(closed.volume, Some(5.0));
        assert_eq!(a.current().unwrap().volume, Some(1.0));
    }

    #[test]
    fn set_current_continues_existing_bar() {
        let mut a = agg(LateTickPolicy::Ignore);
        a.set_current(Some(Bar {
            open_time: MIN,
            open: 5.0,
            high: 6.0,
            low: 4.0,
            close: 5.5,
            volume: None,
        }));
        assert!(a.ingest(7.0, MIN + 100).closed.is_none());
        let cur = a.current().unwrap();
        assert_eq!((cur.open, cur.high, cur.low, cur.close), (5.0, 7.0, 4.0, 7.0));
    }
}
