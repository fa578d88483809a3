//! CSV tick and history feeds.
//!
//! Tick files: `symbol,price,ts[,size]`, `ts` in epoch milliseconds.
//! History files: `symbol,t,o,h,l,c[,v]`, one closed bar per row.
//!
//! This is the boundary where input gets validated. The core assumes finite,
//! non-negative prices and non-empty symbols, so anything else is dropped
//! here, logged and counted. Timestamps must also be representable instants.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use trailwatch_core::Bar;

use crate::watchlist::normalize_symbol;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("open feed {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read feed: {0}")]
    Csv(#[from] csv::Error),
}

/// A validated price update.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub ts: i64,
    pub size: Option<f64>,
}

/// Accepted and rejected row counts for one read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug, Deserialize)]
struct TickRow {
    symbol: String,
    price: f64,
    ts: i64,
    #[serde(default)]
    size: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    symbol: String,
    t: i64,
    #[serde(default)]
    o: Option<f64>,
    #[serde(default)]
    h: Option<f64>,
    #[serde(default)]
    l: Option<f64>,
    #[serde(default)]
    c: Option<f64>,
    #[serde(default)]
    v: Option<f64>,
}

fn csv_reader<R: io::Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(rdr)
}

fn open(path: &Path) -> Result<File, FeedError> {
    File::open(path).map_err(|source| FeedError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Whether `ts` (epoch milliseconds) is a representable UTC instant.
pub fn valid_timestamp(ts: i64) -> bool {
    DateTime::<Utc>::from_timestamp_millis(ts).is_some()
}

/// Check one tick against the core's preconditions.
pub fn validate_tick(symbol: &str, price: f64, ts: i64, size: Option<f64>) -> Option<Tick> {
    let symbol = normalize_symbol(symbol)?;
    if !price.is_finite() || price < 0.0 || !valid_timestamp(ts) {
        return None;
    }
    let size = size.filter(|s| s.is_finite() && *s >= 0.0);
    Some(Tick {
        symbol,
        price,
        ts,
        size,
    })
}

/// Read ticks in file order, dropping rows that fail validation.
pub fn read_ticks<R: io::Read>(rdr: R) -> Result<(Vec<Tick>, FeedStats), FeedError> {
    let mut reader = csv_reader(rdr);
    reader.headers()?;
    let mut ticks = Vec::new();
    let mut stats = FeedStats::default();

    for (line, row) in reader.deserialize::<TickRow>().enumerate() {
        let tick = match row {
            Ok(r) => validate_tick(&r.symbol, r.price, r.ts, r.size),
            Err(e) => {
                debug!(line = line + 2, error = %e, "unparseable tick row");
                None
            }
        };
        match tick {
            Some(t) => {
                stats.accepted += 1;
                ticks.push(t);
            }
            None => {
                stats.rejected += 1;
                warn!(line = line + 2, "dropped invalid tick");
            }
        }
    }

    Ok((ticks, stats))
}

pub fn load_ticks(path: &Path) -> Result<(Vec<Tick>, FeedStats), FeedError> {
    read_ticks(open(path)?)
}

fn row_to_bar(row: &HistoryRow) -> Option<Bar> {
    let (open, high, low, close) = (row.o?, row.h?, row.l?, row.c?);
    if !valid_timestamp(row.t) || ![open, high, low, close].iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(Bar {
        open_time: row.t,
        open,
        high,
        low,
        close,
        volume: row.v.filter(|v| v.is_finite()),
    })
}

/// Read closed bars grouped by symbol, each series sorted oldest first.
///
/// Rows missing any of open/high/low/close are skipped.
pub fn read_history<R: io::Read>(
    rdr: R,
) -> Result<(BTreeMap<String, Vec<Bar>>, FeedStats), FeedError> {
    let mut reader = csv_reader(rdr);
    reader.headers()?;
    let mut series: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
    let mut stats = FeedStats::default();

    for row in reader.deserialize::<HistoryRow>() {
        let parsed = row
            .ok()
            .and_then(|r| Some((normalize_symbol(&r.symbol)?, row_to_bar(&r)?)));
        match parsed {
            Some((symbol, bar)) => {
                stats.accepted += 1;
                series.entry(symbol).or_default().push(bar);
            }
            None => stats.rejected += 1,
        }
    }

    for bars in series.values_mut() {
        bars.sort_by_key(|b| b.open_time);
    }
    if stats.rejected > 0 {
        warn!(skipped = stats.rejected, "history rows skipped");
    }
    Ok((series, stats))
}

pub fn load_history(path: &Path) -> Result<(BTreeMap<String, Vec<Bar>>, FeedStats), FeedError> {
    read_history(open(path)?)
}

/// Split a mixed tick stream per symbol, preserving arrival order.
pub fn group_by_symbol(ticks: Vec<Tick>) -> BTreeMap<String, Vec<Tick>> {
    let mut groups: BTreeMap<String, Vec<Tick>> = BTreeMap::new();
    for tick in ticks {
        groups.entry(tick.symbol.clone()).or_default().push(tick);
    }
    groups
}
