use chrono::NaiveDate;
use serde::Deserialize;
use service_core::error::AppError;

use super::{
    apply_request, publish_summary, report_user_failure, AtStage, PassContext, RotationStage,
    RunSummary, UserFailure, UserOutcome,
};
use crate::models::RefreshCredentialRequest;
use crate::startup::AppState;

/// Queue-triggered invocation payload, as delivered by an SQS event source.
#[derive(Debug, Clone, Deserialize)]
pub struct SqsEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<SqsRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SqsRecord {
    #[serde(rename = "messageId", default)]
    pub message_id: Option<String>,
    pub body: String,
}

impl SqsEvent {
    pub fn from_json(payload: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Label for logs and alerts when the body does not even name a user.
fn user_hint(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("user_name")?.as_str().map(str::to_string))
        .unwrap_or_else(|| "<unknown>".to_string())
}

async fn process_body(
    state: &AppState,
    ctx: &PassContext,
    body: &str,
    today: NaiveDate,
    summary: &mut RunSummary,
) {
    let outcome: Result<UserOutcome, UserFailure> =
        match RefreshCredentialRequest::from_json(body).at(RotationStage::RequestBuilt) {
            Ok(request) => {
                tracing::info!(request = %request, "Processing refresh request");
                apply_request(state, ctx, request, today).await
            }
            Err(failure) => Err(failure),
        };

    if let Err(failure) = &outcome {
        report_user_failure(state, &user_hint(body), failure).await;
    }
    summary.record(&outcome);
}

/// Consumer pass: drain the request queue, re-evaluating and rotating each
/// request.
///
/// Every received message is acknowledged once processed, failed or not; the
/// next scan re-enqueues users that are still due.
#[tracing::instrument(skip(state))]
pub async fn consume(state: &AppState, today: NaiveDate) -> Result<RunSummary, AppError> {
    let queue = state.queue()?.clone();
    let ctx = PassContext::prepare(state).await?;
    let mut summary = RunSummary::default();

    loop {
        let messages = queue.receive(state.settings.consume_batch_size).await?;
        if messages.is_empty() {
            break;
        }
        tracing::info!(count = messages.len(), "Received refresh requests");

        for message in &messages {
            process_body(state, &ctx, &message.body, today, &mut summary).await;
            if let Err(e) = queue.acknowledge(message).await {
                tracing::error!(
                    receipt_handle = %message.receipt_handle,
                    error = %e,
                    "Failed to acknowledge refresh request"
                );
            }
        }
    }

    publish_summary(state, "consume", &summary).await;
    Ok(summary)
}

/// Consumer for one queue-triggered event; message deletion is left to the
/// event source.
#[tracing::instrument(skip(state, event), fields(records = event.records.len()))]
pub async fn handle_event(
    state: &AppState,
    event: &SqsEvent,
    today: NaiveDate,
) -> Result<RunSummary, AppError> {
    let ctx = PassContext::prepare(state).await?;
    let mut summary = RunSummary::default();

    for record in &event.records {
        tracing::debug!(message_id = ?record.message_id, "Processing event record");
        process_body(state, &ctx, &record.body, today, &mut summary).await;
    }

    publish_summary(state, "consume", &summary).await;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_records() {
        let event = SqsEvent::from_json(
            r#"{"Records":[{"messageId":"m-1","body":"{\"user_name\":\"alice\",\"force\":true}"}]}"#,
        )
        .unwrap();

        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].message_id.as_deref(), Some("m-1"));
        assert_eq!(user_hint(&event.records[0].body), "alice");
    }

    #[test]
    fn empty_event_has_no_records() {
        assert!(SqsEvent::from_json("{}").unwrap().records.is_empty());
        assert!(SqsEvent::from_json("[]").is_err());
    }

    #[test]
    fn user_hint_tolerates_garbage() {
        assert_eq!(user_hint("not json"), "<unknown>");
        assert_eq!(user_hint(r#"{"user_name":7}"#), "<unknown>");
    }
}
