use async_trait::async_trait;
use aws_sdk_ses::primitives::Blob;
use aws_sdk_ses::types::{RawMessage, VerificationStatus as SesVerificationStatus};
use aws_sdk_ses::Client as SesClient;
use service_core::error::AppError;

use super::smtp::build_mime;
use super::{aws_error, EmailMessage, EmailProvider, IdentityVerifier, VerificationStatus};

/// SES client used both to check sender/recipient verification and to
/// deliver credential emails.
#[derive(Clone, Debug)]
pub struct SesMailer {
    client: SesClient,
}

impl SesMailer {
    pub fn new(client: SesClient) -> Self {
        Self { client }
    }
}

fn map_status(status: &SesVerificationStatus) -> VerificationStatus {
    match status {
        SesVerificationStatus::Success => VerificationStatus::Success,
        SesVerificationStatus::Pending => VerificationStatus::Pending,
        SesVerificationStatus::Failed => VerificationStatus::Failed,
        SesVerificationStatus::TemporaryFailure => VerificationStatus::TemporaryFailure,
        SesVerificationStatus::NotStarted => VerificationStatus::NotStarted,
        _ => VerificationStatus::Unknown,
    }
}

#[async_trait]
impl IdentityVerifier for SesMailer {
    async fn verification_status(&self, identity: &str) -> Result<VerificationStatus, AppError> {
        let output = self
            .client
            .get_identity_verification_attributes()
            .identities(identity)
            .send()
            .await
            .map_err(|e| aws_error("GetIdentityVerificationAttributes", e))?;

        Ok(output
            .verification_attributes()
            .get(identity)
            .map(|attributes| map_status(attributes.verification_status()))
            .unwrap_or(VerificationStatus::Unknown))
    }
}

#[async_trait]
impl EmailProvider for SesMailer {
    async fn send(&self, email: &EmailMessage) -> Result<Option<String>, AppError> {
        let mime = build_mime(email)?;
        let raw = RawMessage::builder()
            .data(Blob::new(mime.formatted()))
            .build()
            .map_err(|e| AppError::EmailError(format!("Failed to build message: {}", e)))?;

        let output = self
            .client
            .send_raw_email()
            .source(&email.from)
            .destinations(&email.to)
            .raw_message(raw)
            .send()
            .await
            .map_err(|e| aws_error("SendRawEmail", e))?;

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            message_id = %output.message_id(),
            "Email sent through SES"
        );

        Ok(Some(output.message_id().to_string()))
    }

    fn name(&self) -> &'static str {
        "ses"
    }
}
