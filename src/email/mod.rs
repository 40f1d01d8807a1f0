pub mod memory;
pub mod notifier;
pub mod templates;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;

use crate::config::SmtpConfig;

pub use memory::MemoryTransport;
pub use notifier::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PasswordReset,
    VerifyEmail,
}

/// A link to deliver to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub kind: NotificationKind,
    pub link: String,
}

/// Delivers notifications. Called from the notifier task, never from a request handler.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), String>;
}

pub struct SystemMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SystemMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("System SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), String> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {e}"))?,
            )
            .to(to.parse().map_err(|e| format!("Invalid to address: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| format!("Failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;

        Ok(())
    }
}

#[async_trait]
impl Transport for SystemMailer {
    async fn deliver(&self, notification: &Notification) -> Result<(), String> {
        let (subject, html) = match notification.kind {
            NotificationKind::PasswordReset => (
                "Reset Password Notification",
                templates::render_password_reset(&notification.link),
            ),
            NotificationKind::VerifyEmail => (
                "Verify Email Address",
                templates::render_verify_email(&notification.link),
            ),
        };
        self.send(&notification.recipient, subject, &html).await
    }
}

/// Used when SMTP is not configured: the link goes to the log instead of an inbox.
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn deliver(&self, notification: &Notification) -> Result<(), String> {
        tracing::warn!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            "System SMTP not configured. Link: {}",
            notification.link
        );
        Ok(())
    }
}
