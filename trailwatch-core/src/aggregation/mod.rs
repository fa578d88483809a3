//! Tick aggregation into fixed-width bars.

pub mod bar_aggregator;

pub use crate::config::LateTickPolicy;
pub use bar_aggregator::{bucket_start, BarAggregator, Ingest};
