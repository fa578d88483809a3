//! Alert rules and notification delivery.
//!
//! A rule subscribes one symbol to BUY, SELL or both. When a signal arrives,
//! every matching rule fires once: an in-app notice goes out on the broadcast
//! hub and, if SMTP is configured, an email goes through the [`Mailer`].
//! Failures on one channel are logged and never stop the others.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use trailwatch_core::{EngineEvent, EventSink, Side, Signal, SinkError, SymbolEvent};

use crate::broadcast::{BroadcastHub, HubMessage};

/// Which signal side a rule reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSide {
    Buy,
    Sell,
    #[default]
    Any,
}

impl AlertSide {
    pub fn matches(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (AlertSide::Any, _) | (AlertSide::Buy, Side::Buy) | (AlertSide::Sell, Side::Sell)
        )
    }
}

fn default_in_app() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub symbol: String,
    #[serde(default)]
    pub side: AlertSide,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default = "default_in_app")]
    pub in_app: bool,
}

impl AlertRule {
    pub fn matches(&self, symbol: &str, side: Side) -> bool {
        self.symbol.eq_ignore_ascii_case(symbol) && self.side.matches(side)
    }
}

/// Outgoing mail server settings. Email is disabled unless host, user and
/// password are all set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: Option<String>,
}

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SMTP_FROM: &str = "trailwatch <no-reply@example.com>";

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl SmtpSettings {
    pub fn can_email(&self) -> bool {
        is_set(&self.host) && is_set(&self.user) && is_set(&self.pass)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SMTP_PORT)
    }

    pub fn from_address(&self) -> &str {
        self.from
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_SMTP_FROM)
    }
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub symbol: String,
    pub side: Side,
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn for_signal(symbol: &str, signal: &Signal) -> Self {
        let when = DateTime::<Utc>::from_timestamp_millis(signal.time)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| signal.time.to_string());
        Self {
            symbol: symbol.to_string(),
            side: signal.side,
            title: format!("{} {}", signal.side, symbol),
            body: format!(
                "Signal {} on {} @ {:.2} | stop={:.2} | {}",
                signal.side, symbol, signal.price, signal.stop_level, when
            ),
        }
    }
}

/// Email transport.
pub trait Mailer: Send + Sync {
    fn send(&self, settings: &SmtpSettings, to: &str, notice: &Notice) -> Result<(), SinkError>;
}

/// Mailer that records outgoing mail in the log instead of sending it.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, settings: &SmtpSettings, to: &str, notice: &Notice) -> Result<(), SinkError> {
        info!(
            host = settings.host.as_deref().unwrap_or_default(),
            to,
            subject = %notice.title,
            body = %notice.body,
            "email"
        );
        Ok(())
    }
}

/// Sink that evaluates alert rules against every signal.
pub struct NotificationSink {
    rules: Vec<AlertRule>,
    smtp: SmtpSettings,
    mailer: Arc<dyn Mailer>,
    hub: Option<Arc<BroadcastHub>>,
}

impl NotificationSink {
    pub fn new(rules: Vec<AlertRule>, smtp: SmtpSettings, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            rules,
            smtp,
            mailer,
            hub: None,
        }
    }

    /// Deliver in-app notices through `hub`.
    pub fn with_hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Rules that fire for `side` on `symbol`.
    pub fn matching<'a>(&'a self, symbol: &'a str, side: Side) -> impl Iterator<Item = &'a AlertRule> {
        self.rules.iter().filter(move |r| r.matches(symbol, side))
    }

    /// Fire every matching rule. Returns the number of deliveries attempted.
    pub fn dispatch(&self, symbol: &str, signal: &Signal) -> usize {
        let notice = Notice::for_signal(symbol, signal);
        let mut attempts = 0;

        for rule in self.matching(symbol, signal.side) {
            if rule.in_app {
                if let Some(hub) = &self.hub {
                    attempts += 1;
                    hub.publish(&HubMessage::Notify(notice.clone()));
                }
            }

            if let Some(to) = rule.email.as_deref() {
                if !self.smtp.can_email() {
                    debug!(symbol, to, "smtp not configured; email skipped");
                    continue;
                }
                attempts += 1;
                if let Err(e) = self.mailer.send(&self.smtp, to, &notice) {
                    warn!(symbol, to, error = %e, "email delivery failed");
                }
            }
        }
        attempts
    }
}

impl EventSink for NotificationSink {
    fn name(&self) -> &str {
        "notifications"
    }

    fn handle(&self, event: &SymbolEvent) -> Result<(), SinkError> {
        if let EngineEvent::Signal(signal) = &event.event {
            self.dispatch(&event.symbol, signal);
        }
        Ok(())
    }
}
