//! Append-only JSONL persistence of emitted signals.
//!
//! One [`SignalRecord`] per line. Records are keyed by (symbol, timeframe) and
//! carry the engine parameters and their fingerprint so that signals produced
//! under different settings can be told apart later.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use trailwatch_core::{
    EngineConfig, EngineEvent, EventSink, ParamsHash, Side, Signal, SinkError, SourceMode,
    SymbolEvent,
};

/// Rows returned by [`SignalStore::recent`] when no limit is given.
pub const DEFAULT_RECENT_LIMIT: usize = 200;
/// Upper bound on rows returned by [`SignalStore::recent`].
pub const MAX_RECENT_LIMIT: usize = 2000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("signal store I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("signal record encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StoreError> for SinkError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Io { source, .. } => SinkError::Io(source),
            StoreError::Encode(e) => SinkError::Serialize(e.to_string()),
        }
    }
}

/// A persisted signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Content hash of (symbol, timeframe, ts, side, params_hash).
    pub id: String,
    pub symbol: String,
    pub timeframe: String,
    pub side: Side,
    /// Open time of the producing bar (epoch ms).
    pub ts: i64,
    pub price: f64,
    pub stop: f64,
    pub sensitivity: f64,
    pub period: usize,
    pub source_mode: SourceMode,
    pub params_hash: ParamsHash,
}

impl SignalRecord {
    pub fn new(symbol: &str, timeframe: &str, signal: &Signal, config: &EngineConfig) -> Self {
        let params_hash = config.fingerprint();
        let id = record_id(symbol, timeframe, signal, &params_hash);
        Self {
            id,
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            side: signal.side,
            ts: signal.time,
            price: signal.price,
            stop: signal.stop_level,
            sensitivity: config.sensitivity,
            period: config.period,
            source_mode: config.source_mode,
            params_hash,
        }
    }
}

fn record_id(symbol: &str, timeframe: &str, signal: &Signal, params: &ParamsHash) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    hasher.update(b"|");
    hasher.update(timeframe.as_bytes());
    hasher.update(b"|");
    hasher.update(&signal.time.to_le_bytes());
    hasher.update(signal.side.as_str().as_bytes());
    hasher.update(params.0.as_bytes());
    // 16 hex chars is plenty for a per-file identifier.
    hasher.finalize().to_hex().as_str()[..16].to_string()
}

/// JSONL signal file.
///
/// Appends are serialized through an internal lock so concurrent symbols
/// never interleave partial lines.
pub struct SignalStore {
    path: PathBuf,
    timeframe: String,
    config: EngineConfig,
    write_lock: Mutex<()>,
}

impl SignalStore {
    pub fn new(path: impl Into<PathBuf>, timeframe: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            path: path.into(),
            timeframe: timeframe.into(),
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Persist one signal for `symbol`.
    pub fn append(&self, symbol: &str, signal: &Signal) -> Result<SignalRecord, StoreError> {
        let record = SignalRecord::new(symbol, &self.timeframe, signal, &self.config);
        let line = serde_json::to_string(&record)?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        writeln!(file, "{line}").map_err(|e| self.io_err(e))?;
        file.flush().map_err(|e| self.io_err(e))?;

        debug!(symbol, id = %record.id, side = %record.side, "signal stored");
        Ok(record)
    }

    /// Every record in file order. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<SignalRecord>, StoreError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut records = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line.map_err(|e| self.io_err(e))?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<SignalRecord>(&line) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Most recent signals for `symbol` in this store's timeframe, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_RECENT_LIMIT`] and is clamped to
    /// `1..=MAX_RECENT_LIMIT`.
    pub fn recent(&self, symbol: &str, limit: Option<usize>) -> Result<Vec<SignalRecord>, StoreError> {
        let limit = limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);

        let mut matching: Vec<SignalRecord> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.symbol == symbol && r.timeframe == self.timeframe)
            .collect();
        // Stable sort keeps append order among equal timestamps.
        matching.sort_by(|a, b| b.ts.cmp(&a.ts));
        matching.truncate(limit);
        Ok(matching)
    }
}

impl EventSink for SignalStore {
    fn name(&self) -> &str {
        "signal-store"
    }

    fn handle(&self, event: &SymbolEvent) -> Result<(), SinkError> {
        match &event.event {
            EngineEvent::Signal(signal) => {
                self.append(&event.symbol, signal)?;
                Ok(())
            }
            EngineEvent::BarClosed(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trailwatch_core::Bar;

    fn sig(side: Side, time: i64) -> Signal {
        Signal {
            side,
            time,
            price: 100.0,
            stop_level: 99.0,
        }
    }

    fn store(dir: &TempDir) -> SignalStore {
        SignalStore::new(
            dir.path().join("nested/signals.jsonl"),
            "1m",
            EngineConfig::default(),
        )
    }

    #[test]
    fn append_creates_parent_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let rec = store.append("AAPL", &sig(Side::Buy, 60_000)).unwrap();
        assert_eq!(rec.id.len(), 16);
        assert_eq!(rec.params_hash, EngineConfig::default().fingerprint());

        let all = store.read_all().unwrap();
        assert_eq!(all, vec![rec]);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).read_all().unwrap().is_empty());
        assert!(store(&dir).recent("AAPL", None).unwrap().is_empty());
    }

    #[test]
    fn recent_is_newest_first_and_filtered() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.append("AAPL", &sig(Side::Buy, 1)).unwrap();
        store.append("MSFT", &sig(Side::Sell, 2)).unwrap();
        store.append("AAPL", &sig(Side::Sell, 3)).unwrap();

        let recent = store.recent("AAPL", None).unwrap();
        let ts: Vec<i64> = recent.iter().map(|r| r.ts).collect();
        assert_eq!(ts, vec![3, 1]);
    }

    #[test]
    fn recent_limit_is_clamped() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for t in 0..5 {
            store.append("SPY", &sig(Side::Buy, t)).unwrap();
        }
        assert_eq!(store.recent("SPY", Some(0)).unwrap().len(), 1);
        assert_eq!(store.recent("SPY", Some(2)).unwrap().len(), 2);
        assert_eq!(store.recent("SPY", Some(1_000_000)).unwrap().len(), 5);
    }

    #[test]
    fn malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.append("AAPL", &sig(Side::Buy, 1)).unwrap();
        let mut f = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(f, "{{not json").unwrap();
        writeln!(f).unwrap();
        store.append("AAPL", &sig(Side::Sell, 2)).unwrap();

        assert_eq!(store.read_all().unwrap().len(), 2);
    }

    #[test]
    fn other_timeframes_are_not_recent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.jsonl");
        let minute = SignalStore::new(&path, "1m", EngineConfig::default());
        let hour = SignalStore::new(&path, "1h", EngineConfig::default());
        minute.append("AAPL", &sig(Side::Buy, 1)).unwrap();
        hour.append("AAPL", &sig(Side::Buy, 2)).unwrap();

        assert_eq!(minute.recent("AAPL", None).unwrap().len(), 1);
        assert_eq!(hour.recent("AAPL", None).unwrap()[0].ts, 2);
    }

    #[test]
    fn sink_ignores_bars() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .handle(&SymbolEvent {
                symbol: "AAPL".into(),
                event: EngineEvent::BarClosed(Bar::from_tick(0, 1.0, None)),
            })
            .unwrap();
        store
            .handle(&SymbolEvent {
                symbol: "AAPL".into(),
                event: EngineEvent::Signal(sig(Side::Sell, 0)),
            })
            .unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].side, Side::Sell);
    }

    #[test]
    fn ids_differ_by_side_and_params() {
        let cfg = EngineConfig::default();
        let a = SignalRecord::new("AAPL", "1m", &sig(Side::Buy, 5), &cfg);
        let b = SignalRecord::new("AAPL", "1m", &sig(Side::Sell, 5), &cfg);
        let c = SignalRecord::new(
            "AAPL",
            "1m",
            &sig(Side::Buy, 5),
            &EngineConfig {
                sensitivity: 2.0,
                ..cfg
            },
        );
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }
}
