use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;

use super::{EmailMessage, EmailProvider};
use crate::config::SmtpSettings;

/// Build the plain-text MIME message shared by every mail transport.
pub(crate) fn build_mime(email: &EmailMessage) -> Result<Message, AppError> {
    let from: Mailbox = email.from.parse()?;
    let to: Mailbox = email.to.parse()?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(&email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.body_text.clone())?;

    Ok(message)
}

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpProvider {
    pub fn new(settings: &SmtpSettings) -> Result<Self, AppError> {
        let creds = Credentials::new(
            settings.user.clone(),
            settings.password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Failed to create SMTP relay: {}", e)))?
            .port(settings.port)
            .credentials(creds)
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailMessage) -> Result<Option<String>, AppError> {
        let message = build_mime(email)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| AppError::EmailError(format!("Failed to send email: {}", e)))?;

        let provider_id = response.message().next().map(|s| s.to_string());

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email sent over SMTP"
        );

        Ok(provider_id)
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> EmailMessage {
        EmailMessage {
            from: "rotation@example.com".to_string(),
            to: to.to_string(),
            subject: "New credentials".to_string(),
            body_text: "Password: hunter2".to_string(),
        }
    }

    #[test]
    fn builds_plain_text_message() {
        let message = build_mime(&email("alice@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: alice@example.com"));
        assert!(raw.contains("Subject: New credentials"));
        assert!(raw.contains("text/plain"));
    }

    #[test]
    fn rejects_bad_recipient() {
        let err = build_mime(&email("not an address")).unwrap_err();
        assert!(matches!(err, AppError::EmailError(_)));
    }
}
