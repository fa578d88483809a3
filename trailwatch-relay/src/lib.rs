//! trailwatch relay: everything downstream of the engine.
//!
//! This crate builds on `trailwatch-core` to provide:
//! - TOML application config (engine parameters, store, SMTP, alert rules)
//! - CSV tick and history feeds with input validation
//! - JSONL signal store with recent-signal queries
//! - Alert rules with in-app and SMTP email notification
//! - Broadcast hub and watch list
//! - A `Relay` that wires the registry to those sinks and replays ticks

pub mod alerts;
pub mod broadcast;
pub mod config;
pub mod feed;
pub mod mail;
pub mod pipeline;
pub mod store;
pub mod watchlist;

pub use alerts::{
    AlertRule, AlertSide, LogMailer, Mailer, Notice, NotificationSink, SmtpSettings,
    DEFAULT_SMTP_FROM, DEFAULT_SMTP_PORT,
};
pub use broadcast::{BroadcastHub, HubMessage};
pub use config::{timeframe_label, AppConfig, AppConfigError, StoreConfig};
pub use feed::{
    group_by_symbol, load_history, load_ticks, read_history, read_ticks, valid_timestamp,
    validate_tick, FeedError, FeedStats, Tick,
};
pub use mail::{mailer_for, MailError, SmtpMailer};
pub use pipeline::{PrimeSummary, Relay, ReplaySummary};
pub use store::{SignalRecord, SignalStore, StoreError, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
pub use watchlist::{normalize_symbol, Watchlist};
