//! Plaintext email notifications over SMTP with STARTTLS.

use std::time::Duration;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("message not delivered: {0}")]
    Undelivered(String),
}

/// Anything that can deliver one subject + plaintext body to the operator.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

impl<T: Notifier> Notifier for &T {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        (**self).notify(subject, body).await
    }
}

/// Mail relay settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub address: String,
    pub password: String,
    pub recipient: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &MailSettings) -> Result<Self, NotifyError> {
        let from: Mailbox = settings.address.parse()?;
        let to: Mailbox = settings.recipient.parse()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.address.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(30)))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

/// Assemble the message the notifier sends. Split out so it can be checked
/// without a relay.
pub fn build_message(
    from: &Mailbox,
    to: &Mailbox,
    subject: &str,
    body: &str,
) -> Result<Message, NotifyError> {
    let message = Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())?;
    Ok(message)
}

impl Notifier for SmtpNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = build_message(&self.from, &self.to, subject, body)?;
        let response = self.transport.send(message).await?;
        if !response.is_positive() {
            return Err(NotifyError::Undelivered(format!("{:?}", response.code())));
        }
        debug!(to = %self.to, "Notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MailSettings {
        MailSettings {
            address: "bot@example.com".into(),
            password: "app-password".into(),
            recipient: "ops@example.com".into(),
            smtp_host: "smtp.example.com".into(),
            smtp_port: DEFAULT_SMTP_PORT,
        }
    }

    #[test]
    fn notifier_builds_from_valid_settings() {
        assert!(SmtpNotifier::new(&settings()).is_ok());
    }

    #[test]
    fn invalid_address_is_rejected() {
        let mut bad = settings();
        bad.recipient = "not an address".into();
        assert!(matches!(SmtpNotifier::new(&bad), Err(NotifyError::Address(_))));
    }

    #[test]
    fn message_is_utf8_plaintext() {
        let from: Mailbox = "bot@example.com".parse().unwrap();
        let to: Mailbox = "ops@example.com".parse().unwrap();
        let message = build_message(&from, &to, "Report [OK]", "投稿しました").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Report [OK]"));
        assert!(raw.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(raw.contains("To: ops@example.com"));
    }
}
