//! SMTP delivery for email alerts.
//!
//! Port 465 uses implicit TLS; every other port upgrades with STARTTLS.
//! The transport is built once from [`SmtpSettings`] and reused per message.

use std::sync::Arc;

use lettre::address::AddressError;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use thiserror::Error;
use tracing::{debug, info, warn};

use trailwatch_core::SinkError;

use crate::alerts::{LogMailer, Mailer, Notice, SmtpSettings};

const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("smtp needs host, user and pass")]
    NotConfigured,

    #[error("bad address: {0}")]
    Address(#[from] AddressError),

    #[error("build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

impl From<MailError> for SinkError {
    fn from(e: MailError) -> Self {
        SinkError::Delivery {
            channel: "email".into(),
            reason: e.to_string(),
        }
    }
}

/// Mailer that talks to a real SMTP server.
#[derive(Debug)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_settings(settings: &SmtpSettings) -> Result<Self, MailError> {
        if !settings.can_email() {
            return Err(MailError::NotConfigured);
        }
        let (Some(host), Some(user), Some(pass)) = (
            settings.host.as_deref(),
            settings.user.as_deref(),
            settings.pass.as_deref(),
        ) else {
            return Err(MailError::NotConfigured);
        };

        let from: Mailbox = settings.from_address().parse()?;
        let port = settings.port();
        let builder = if port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(host.trim())?
        } else {
            SmtpTransport::starttls_relay(host.trim())?
        };
        let transport = builder
            .port(port)
            .credentials(Credentials::new(user.to_string(), pass.to_string()))
            .build();

        debug!(host, port, "smtp transport ready");
        Ok(Self { transport, from })
    }

    /// Plain-text message for `notice`, addressed to `to`.
    pub fn compose(&self, to: &str, notice: &Notice) -> Result<Message, MailError> {
        let to: Mailbox = to.parse()?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notice.title.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body.clone())?;
        Ok(message)
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, _settings: &SmtpSettings, to: &str, notice: &Notice) -> Result<(), SinkError> {
        let message = self.compose(to, notice)?;
        self.transport.send(&message).map_err(MailError::from)?;
        info!(to, subject = %notice.title, "email sent");
        Ok(())
    }
}

/// Pick the mailer for `settings`: SMTP when fully configured, otherwise
/// (or if the transport cannot be built) the logging fallback.
pub fn mailer_for(settings: &SmtpSettings) -> Arc<dyn Mailer> {
    if !settings.can_email() {
        debug!("smtp not configured; emails will only be logged");
        return Arc::new(LogMailer);
    }
    match SmtpMailer::from_settings(settings) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!(error = %e, "smtp unavailable; emails will only be logged");
            Arc::new(LogMailer)
        }
    }
}
