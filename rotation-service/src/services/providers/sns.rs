use async_trait::async_trait;
use aws_sdk_sns::Client as SnsClient;
use service_core::error::AppError;

use super::{aws_error, AlertPublisher};
use crate::services::alerts::{format_alert, Severity};

/// Publishes operator alerts to an SNS topic.
#[derive(Clone, Debug)]
pub struct SnsAlertPublisher {
    client: SnsClient,
    topic_arn: String,
}

impl SnsAlertPublisher {
    pub fn new(client: SnsClient, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl AlertPublisher for SnsAlertPublisher {
    async fn publish(&self, message: &str, severity: Severity) -> Result<(), AppError> {
        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(format_alert(message, severity))
            .send()
            .await
            .map_err(|e| aws_error("Publish", e))?;

        tracing::debug!(
            severity = %severity,
            message_id = output.message_id().unwrap_or_default(),
            "Alert published"
        );
        Ok(())
    }
}
