pub mod iam;
pub mod mock;
pub mod ses;
pub mod smtp;
pub mod sns;
pub mod sqs;
pub mod sts;

use async_trait::async_trait;
use aws_sdk_iam::error::DisplayErrorContext;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::fmt;

use crate::models::RefreshCredentialRequest;
use crate::services::alerts::Severity;

pub use iam::IamDirectory;
pub use ses::SesMailer;
pub use smtp::SmtpProvider;
pub use sns::SnsAlertPublisher;
pub use sqs::SqsRequestQueue;
pub use sts::resolve_account;

/// Render an SDK error with its full source chain.
pub(crate) fn aws_error<E>(operation: &str, err: E) -> AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AppError::Aws(anyhow::anyhow!(
        "{} failed: {}",
        operation,
        DisplayErrorContext(err)
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Success,
    Pending,
    Failed,
    TemporaryFailure,
    NotStarted,
    Unknown,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Success => write!(f, "Success"),
            VerificationStatus::Pending => write!(f, "Pending"),
            VerificationStatus::Failed => write!(f, "Failed"),
            VerificationStatus::TemporaryFailure => write!(f, "TemporaryFailure"),
            VerificationStatus::NotStarted => write!(f, "NotStarted"),
            VerificationStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body_text: String,
}

/// A request pulled off the queue, with the handle needed to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub receipt_handle: String,
    pub body: String,
}

/// Verification state of mail identities (addresses or domains).
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verification_status(&self, identity: &str) -> Result<VerificationStatus, AppError>;
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send and return the provider's message id when it reports one.
    async fn send(&self, email: &EmailMessage) -> Result<Option<String>, AppError>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait RequestQueue: Send + Sync {
    async fn enqueue(&self, request: &RefreshCredentialRequest) -> Result<(), AppError>;
    async fn receive(&self, max_messages: i32) -> Result<Vec<QueuedMessage>, AppError>;
    async fn acknowledge(&self, message: &QueuedMessage) -> Result<(), AppError>;
}

#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, message: &str, severity: Severity) -> Result<(), AppError>;
}
