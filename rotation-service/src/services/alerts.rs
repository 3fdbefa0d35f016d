use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::services::metrics::record_alert;
use crate::services::providers::AlertPublisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Wire format of an operator alert: `[SEVERITY]:message`.
pub fn format_alert(message: &str, severity: Severity) -> String {
    format!("[{}]:{}", severity, message)
}

/// Best-effort operator alerting.
///
/// A failed publish is logged and swallowed so that alerting never aborts a
/// rotation run.
#[derive(Clone, Default)]
pub struct Alerter {
    publisher: Option<Arc<dyn AlertPublisher>>,
}

impl Alerter {
    pub fn new(publisher: Option<Arc<dyn AlertPublisher>>) -> Self {
        Self { publisher }
    }

    pub fn with_publisher(publisher: Arc<dyn AlertPublisher>) -> Self {
        Self::new(Some(publisher))
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub async fn publish(&self, message: &str, severity: Severity) {
        record_alert(severity);

        let Some(publisher) = &self.publisher else {
            tracing::debug!(severity = %severity, "No alert topic configured, alert not published");
            return;
        };

        if let Err(e) = publisher.publish(message, severity).await {
            tracing::error!(severity = %severity, error = %e, "Failed to publish alert");
        }
    }
}
