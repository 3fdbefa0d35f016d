#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rotation_service::models::{AccountInfo, EMAIL_TAG};
use rotation_service::services::directory::AccessKeyStatus;
use rotation_service::services::policy::LimitDefaults;
use rotation_service::services::providers::mock::{
    InMemoryDirectory, InMemoryQueue, MockEmailProvider, MockIdentityVerifier,
    RecordingAlertPublisher,
};
use rotation_service::services::providers::VerificationStatus;
use rotation_service::services::{Alerter, ReportPolling};
use rotation_service::startup::{AppState, RotationSettings};
use std::sync::Arc;

pub const ACCOUNT_ID: &str = "123456789012";
pub const VERIFIED_DOMAIN: &str = "example.com";

/// Rotation service wired to in-memory collaborators.
pub struct TestApp {
    pub state: AppState,
    pub directory: Arc<InMemoryDirectory>,
    pub verifier: MockIdentityVerifier,
    pub mailer: Arc<MockEmailProvider>,
    pub queue: Arc<InMemoryQueue>,
    pub alerts: Arc<RecordingAlertPublisher>,
}

pub fn settings() -> RotationSettings {
    RotationSettings {
        limits: LimitDefaults::default(),
        password_reset_required: true,
        mail_from: "rotation@example.com".to_string(),
        sent_by: Some("Cloud Team".to_string()),
        report: ReportPolling {
            max_attempts: 3,
            interval: std::time::Duration::from_millis(1),
        },
        consume_batch_size: 2,
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_mailer(MockEmailProvider::new())
    }

    pub fn with_mailer(mailer: MockEmailProvider) -> Self {
        let directory = Arc::new(InMemoryDirectory::new().with_page_size(2));
        let verifier =
            MockIdentityVerifier::new().with_status(VERIFIED_DOMAIN, VerificationStatus::Success);
        let mailer = Arc::new(mailer);
        let queue = Arc::new(InMemoryQueue::new());
        let alerts = Arc::new(RecordingAlertPublisher::new());

        let state = AppState {
            account: AccountInfo::new(ACCOUNT_ID, None),
            directory: directory.clone(),
            store: directory.clone(),
            verifier: Arc::new(verifier.clone()),
            email_provider: mailer.clone(),
            queue: Some(queue.clone()),
            alerter: Alerter::with_publisher(alerts.clone()),
            settings: settings(),
        };

        Self {
            state,
            directory,
            verifier,
            mailer,
            queue,
            alerts,
        }
    }

    pub fn without_queue(mut self) -> Self {
        self.state.queue = None;
        self
    }

    /// Add a user tagged with `{name}@example.com`.
    pub fn add_tagged_user(&self, name: &str) {
        self.directory.add_user(name);
        self.directory
            .set_tag(name, EMAIL_TAG, &format!("{}@{}", name, VERIFIED_DOMAIN));
    }

    pub fn add_key(&self, user: &str, id: &str, age_days: i64) {
        self.directory
            .add_access_key(user, id, days_ago(age_days), AccessKeyStatus::Active);
    }
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
