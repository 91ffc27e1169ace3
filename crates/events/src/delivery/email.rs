//! Alert delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send a
//! plain-text alert email to every configured recipient. Configuration is
//! loaded from environment variables; if `SMTP_HOST` is not set,
//! [`EmailConfig::from_env`] returns `None` and no mailer should be built.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secwatch_core::alert::AlertEvent;
use secwatch_core::collaborators::Notifier;
use secwatch_core::error::DeliveryError;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// No recipient addresses were configured.
    #[error("No alert recipients configured")]
    NoRecipients,
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "secwatch@localhost";

/// Upper bound on a single SMTP conversation.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Alert recipients.
    pub recipients: Vec<String>,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable                 | Required | Default              |
    /// |--------------------------|----------|----------------------|
    /// | `SMTP_HOST`              | yes      | --                   |
    /// | `SMTP_PORT`              | no       | `587`                |
    /// | `SMTP_FROM`              | no       | `secwatch@localhost` |
    /// | `SMTP_USER`              | no       | --                   |
    /// | `SMTP_PASSWORD`          | no       | --                   |
    /// | `ALERT_EMAIL_RECIPIENTS` | yes      | -- (comma-separated) |
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let smtp_host = lookup("SMTP_HOST").filter(|h| !h.trim().is_empty())?;
        Some(Self {
            smtp_host,
            smtp_port: lookup("SMTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: lookup("SMTP_FROM").unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
            recipients: lookup("ALERT_EMAIL_RECIPIENTS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            smtp_user: lookup("SMTP_USER"),
            smtp_password: lookup("SMTP_PASSWORD"),
        })
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Validated sender and recipient mailboxes.
#[derive(Debug, Clone)]
pub struct AlertEnvelope {
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl AlertEnvelope {
    /// Parse the sender and recipient addresses from the configuration.
    pub fn from_config(config: &EmailConfig) -> Result<Self, EmailError> {
        if config.recipients.is_empty() {
            return Err(EmailError::NoRecipients);
        }

        let from: Mailbox = config.from_address.parse()?;
        let recipients = config
            .recipients
            .iter()
            .map(|r| r.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { from, recipients })
    }

    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }

    /// Assemble the plain-text alert message.
    pub fn build_message(&self, alert: &AlertEvent) -> Result<Message, EmailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!("[secwatch] {}", alert.subject))
            .header(ContentType::TEXT_PLAIN);
        for to in &self.recipients {
            builder = builder.to(to.clone());
        }

        let body = format!(
            "{}\nCycle: {}\nRaised at: {}\n",
            alert.body,
            alert.cycle,
            alert.raised_at.to_rfc3339()
        );

        builder.body(body).map_err(|e| EmailError::Build(e.to_string()))
    }
}

/// Sends alert emails via SMTP.
pub struct EmailDelivery {
    envelope: AlertEnvelope,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDelivery {
    /// Validate addresses and build the SMTP transport.
    ///
    /// No connection is opened here; the first send connects lazily.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let envelope = AlertEnvelope::from_config(&config)?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port)
                .timeout(Some(SMTP_TIMEOUT));

        if let (Some(user), Some(pass)) = (config.smtp_user, config.smtp_password) {
            transport_builder = transport_builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            envelope,
            mailer: transport_builder.build(),
        })
    }

    /// Send one alert email to every recipient.
    pub async fn deliver(&self, alert: &AlertEvent) -> Result<(), EmailError> {
        let email = self.envelope.build_message(alert)?;
        self.mailer.send(email).await?;

        tracing::info!(
            recipients = self.envelope.recipient_count(),
            cycle = alert.cycle,
            entities = alert.entity_ids.len(),
            "Alert email sent",
        );
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailDelivery {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn send(&self, alert: &AlertEvent) -> Result<(), DeliveryError> {
        self.deliver(alert).await.map_err(|e| DeliveryError::Channel {
            channel: "email",
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
