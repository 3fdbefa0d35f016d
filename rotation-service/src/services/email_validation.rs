use regex::Regex;
use service_core::error::AppError;
use std::sync::{Arc, OnceLock};

use crate::services::alerts::{Alerter, Severity};
use crate::services::providers::{IdentityVerifier, VerificationStatus};

static EMAIL_SHAPE: OnceLock<Option<Regex>> = OnceLock::new();

fn email_shape() -> Option<&'static Regex> {
    EMAIL_SHAPE
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.+-]+@([a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+)$").ok())
        .as_ref()
}

/// Domain part of a well-formed address, `None` when the shape is wrong.
pub fn email_domain(email: &str) -> Option<&str> {
    email_shape()?
        .captures(email)
        .and_then(|captures| captures.get(1))
        .map(|domain| domain.as_str())
}

pub fn is_well_formed(email: &str) -> bool {
    email_domain(email).is_some()
}

/// Checks that freshly generated secrets may be mailed to an address.
///
/// The exact address is checked first, then its domain; the first verified
/// identity wins. Every rejection is logged and raised as a `WARN` alert.
pub struct EmailValidator {
    verifier: Arc<dyn IdentityVerifier>,
    alerter: Alerter,
}

impl EmailValidator {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, alerter: Alerter) -> Self {
        Self { verifier, alerter }
    }

    pub async fn validate(&self, user_name: &str, email: &str) -> Result<bool, AppError> {
        let Some(domain) = email_domain(email) else {
            let message = format!("For user {}, {} is not a valid email.", user_name, email);
            tracing::warn!(user = %user_name, email = %email, "{}", message);
            self.alerter.publish(&message, Severity::Warn).await;
            return Ok(false);
        };

        tracing::info!(user = %user_name, email = %email, "Checking email verification status");
        let status = self.verifier.verification_status(email).await?;
        if status == VerificationStatus::Success {
            tracing::info!(user = %user_name, email = %email, "Email verified");
            return Ok(true);
        }

        tracing::info!(
            user = %user_name,
            domain = %domain,
            email_status = %status,
            "Email not verified, checking domain"
        );
        let status = self.verifier.verification_status(domain).await?;
        if status == VerificationStatus::Success {
            tracing::info!(user = %user_name, domain = %domain, "Email domain verified");
            return Ok(true);
        }

        let message = format!(
            "User {} with email {} is not validated by AWS SES.",
            user_name, email
        );
        tracing::warn!(user = %user_name, email = %email, domain_status = %status, "{}", message);
        self.alerter.publish(&message, Severity::Warn).await;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::{MockIdentityVerifier, RecordingAlertPublisher};

    fn validator(verifier: MockIdentityVerifier) -> (EmailValidator, Arc<RecordingAlertPublisher>) {
        let alerts = Arc::new(RecordingAlertPublisher::new());
        let validator = EmailValidator::new(Arc::new(verifier), Alerter::with_publisher(alerts.clone()));
        (validator, alerts)
    }

    #[test]
    fn shape_rule() {
        assert_eq!(email_domain("a.b+c@sub.example.com"), Some("sub.example.com"));
        assert!(!is_well_formed("not-an-email"));
        assert!(!is_well_formed("x@"));
        assert!(!is_well_formed("x@localhost"));
        assert!(!is_well_formed("spaced name@example.com"));
        assert!(!is_well_formed("x@exa_mple.com"));
    }

    #[tokio::test]
    async fn exact_address_wins_first() {
        let verifier = MockIdentityVerifier::new()
            .with_status("alice@example.com", VerificationStatus::Success);
        let (validator, alerts) = validator(verifier.clone());

        assert!(validator.validate("alice", "alice@example.com").await.unwrap());
        assert_eq!(verifier.lookups(), vec!["alice@example.com".to_string()]);
        assert!(alerts.alerts().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_verified_domain() {
        let verifier = MockIdentityVerifier::new()
            .with_status("alice@example.com", VerificationStatus::Pending)
            .with_status("example.com", VerificationStatus::Success);
        let (validator, _) = validator(verifier.clone());

        assert!(validator.validate("alice", "alice@example.com").await.unwrap());
        assert_eq!(
            verifier.lookups(),
            vec!["alice@example.com".to_string(), "example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn unverified_address_is_rejected_with_alert() {
        let verifier = MockIdentityVerifier::new()
            .with_status("alice@example.com", VerificationStatus::Failed);
        let (validator, alerts) = validator(verifier);

        assert!(!validator.validate("alice", "alice@example.com").await.unwrap());

        let alerts = alerts.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, Severity::Warn);
        assert!(alerts[0].1.contains("not validated by AWS SES"));
    }

    #[tokio::test]
    async fn malformed_address_skips_lookups() {
        let verifier = MockIdentityVerifier::new();
        let (validator, alerts) = validator(verifier.clone());

        assert!(!validator.validate("alice", "not-an-email").await.unwrap());
        assert!(verifier.lookups().is_empty());
        assert_eq!(alerts.alerts().len(), 1);
        assert!(alerts.alerts()[0].1.contains("is not a valid email"));
    }
}
