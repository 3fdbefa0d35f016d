use async_trait::async_trait;
use aws_sdk_sqs::Client as SqsClient;
use service_core::error::AppError;

use super::{aws_error, QueuedMessage, RequestQueue};
use crate::models::RefreshCredentialRequest;

const DEFAULT_WAIT_TIME_SECONDS: i32 = 20;

/// Refresh request queue backed by SQS. Bodies are the JSON form of
/// [`RefreshCredentialRequest`].
#[derive(Clone, Debug)]
pub struct SqsRequestQueue {
    client: SqsClient,
    queue_url: String,
    wait_time_seconds: i32,
}

impl SqsRequestQueue {
    pub fn new(client: SqsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            wait_time_seconds: DEFAULT_WAIT_TIME_SECONDS,
        }
    }
}

#[async_trait]
impl RequestQueue for SqsRequestQueue {
    async fn enqueue(&self, request: &RefreshCredentialRequest) -> Result<(), AppError> {
        let body = request.to_json()?;
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| aws_error("SendMessage", e))?;
        Ok(())
    }

    async fn receive(&self, max_messages: i32) -> Result<Vec<QueuedMessage>, AppError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.clamp(1, 10))
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|e| aws_error("ReceiveMessage", e))?;

        let messages = output
            .messages()
            .iter()
            .filter_map(|message| {
                let (Some(handle), Some(body)) = (message.receipt_handle(), message.body()) else {
                    tracing::warn!(
                        message_id = message.message_id().unwrap_or_default(),
                        "Dropping queue message without body or receipt handle"
                    );
                    return None;
                };
                Some(QueuedMessage {
                    receipt_handle: handle.to_string(),
                    body: body.to_string(),
                })
            })
            .collect();

        Ok(messages)
    }

    async fn acknowledge(&self, message: &QueuedMessage) -> Result<(), AppError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| aws_error("DeleteMessage", e))?;
        Ok(())
    }
}
