//! Metrics collection for rotation-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use service_core::error::AppError;
use std::sync::OnceLock;

use crate::models::CredentialKind;
use crate::services::alerts::Severity;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is a no-op.
pub fn init_metrics() -> Result<(), AppError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("failed to install Prometheus recorder: {}", e))
    })?;

    if METRICS_HANDLE.set(handle).is_err() {
        tracing::warn!("Metrics handle already initialized");
    }
    Ok(())
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// `outcome` is one of `rotated`, `enqueued`, `skipped`, `failed`.
pub fn record_user_outcome(outcome: &'static str) {
    metrics::counter!("iam_rotation_users_total", "outcome" => outcome).increment(1);
}

pub fn record_rotation(kind: CredentialKind) {
    metrics::counter!("iam_rotation_credentials_rotated_total", "kind" => kind.to_string())
        .increment(1);
}

pub fn record_enqueued() {
    metrics::counter!("iam_rotation_requests_enqueued_total").increment(1);
}

pub fn record_alert(severity: Severity) {
    metrics::counter!("iam_rotation_alerts_total", "severity" => severity.to_string())
        .increment(1);
}
