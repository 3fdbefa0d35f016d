//! Credential report retrieval.
//!
//! Report generation is asynchronous on the IAM side, so fetching polls at a
//! fixed interval until the report is complete or the attempt budget runs out.

use backoff::backoff::Backoff;
use backoff::future::retry;
use service_core::error::AppError;
use std::time::Duration;

use crate::models::CredentialReport;
use crate::services::directory::{Directory, ReportState};

pub const DEFAULT_REPORT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_REPORT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Fixed-interval backoff that gives up after `max_attempts` tries.
#[derive(Debug, Clone)]
pub struct CappedConstantBackoff {
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl CappedConstantBackoff {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            attempts: 0,
        }
    }
}

impl Backoff for CappedConstantBackoff {
    fn reset(&mut self) {
        self.attempts = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            None
        } else {
            Some(self.interval)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportPolling {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ReportPolling {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_REPORT_MAX_ATTEMPTS,
            interval: DEFAULT_REPORT_POLL_INTERVAL,
        }
    }
}

async fn poll_once(directory: &dyn Directory) -> Result<Vec<u8>, backoff::Error<AppError>> {
    let state = directory
        .generate_credential_report()
        .await
        .map_err(backoff::Error::permanent)?;

    if state != ReportState::Complete {
        tracing::debug!(state = ?state, "Credential report not ready");
        return Err(backoff::Error::transient(AppError::TransientDependency(
            "credential report generation in progress".to_string(),
        )));
    }

    directory.get_credential_report().await.map_err(|e| {
        if e.is_transient() {
            backoff::Error::transient(e)
        } else {
            backoff::Error::permanent(e)
        }
    })
}

/// Generate, wait for and parse the account credential report.
pub async fn fetch_credential_report(
    directory: &dyn Directory,
    polling: ReportPolling,
) -> Result<CredentialReport, AppError> {
    let backoff = CappedConstantBackoff::new(polling.interval, polling.max_attempts);

    let content = retry(backoff, || poll_once(directory)).await.map_err(|e| {
        tracing::error!(
            error = %e,
            max_attempts = polling.max_attempts,
            "Credential report unavailable"
        );
        e
    })?;

    let report = CredentialReport::parse(&content)?;
    tracing::info!(users = report.len(), "Credential report loaded");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::InMemoryDirectory;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn fast(max_attempts: u32) -> ReportPolling {
        ReportPolling {
            max_attempts,
            interval: Duration::from_millis(1),
        }
    }

    #[test]
    fn backoff_stops_after_budget() {
        let mut backoff = CappedConstantBackoff::new(Duration::from_millis(5), 3);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(5)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(5)));
        assert_eq!(backoff.next_backoff(), None);

        backoff.reset();
        assert!(backoff.next_backoff().is_some());
    }

    #[tokio::test]
    async fn waits_for_report_completion() {
        let directory = InMemoryDirectory::new()
            .with_report_states([ReportState::Started, ReportState::InProgress]);
        directory.add_user("alice");
        directory.set_login_profile("alice", Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap());

        let report = fetch_credential_report(&directory, fast(5)).await.unwrap();

        assert_eq!(directory.report_requests(), 3);
        assert_eq!(
            report.password_last_changed("alice"),
            NaiveDate::from_ymd_opt(2024, 5, 6)
        );
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let directory = InMemoryDirectory::new().with_report_states([ReportState::InProgress; 10]);

        let err = fetch_credential_report(&directory, fast(3)).await.unwrap_err();

        assert!(matches!(err, AppError::TransientDependency(_)));
        assert_eq!(directory.report_requests(), 3);
    }
}
