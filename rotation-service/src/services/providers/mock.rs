//! In-memory providers for local runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use service_core::error::AppError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    AlertPublisher, EmailMessage, EmailProvider, IdentityVerifier, QueuedMessage, RequestQueue,
    VerificationStatus,
};
use crate::models::RefreshCredentialRequest;
use crate::services::alerts::Severity;
use crate::services::directory::{
    AccessKeyMetadata, AccessKeyStatus, CredentialStore, Directory, DirectoryUser, NewAccessKey,
    Page, PasswordPolicy, ReportState,
};

const MAX_ACCESS_KEYS_PER_USER: usize = 2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn paginate<T: Clone>(
    items: &[T],
    marker: Option<String>,
    page_size: usize,
) -> Result<Page<T>, AppError> {
    let start = match marker {
        Some(marker) => marker
            .parse::<usize>()
            .map_err(|_| AppError::ValidationError(format!("invalid marker: {}", marker)))?,
        None => 0,
    };
    let end = (start + page_size.max(1)).min(items.len());
    let page = items.get(start..end).unwrap_or_default().to_vec();
    let marker = (end < items.len()).then(|| end.to_string());
    Ok(Page {
        items: page,
        marker,
    })
}

#[derive(Default)]
struct DirectoryState {
    users: Vec<String>,
    tags: HashMap<String, Vec<(String, String)>>,
    login_profiles: HashMap<String, DateTime<Utc>>,
    password_changed: HashMap<String, DateTime<Utc>>,
    access_keys: HashMap<String, Vec<AccessKeyMetadata>>,
    report: Option<Vec<u8>>,
    report_states: VecDeque<ReportState>,
    report_requests: u32,
    policy: Option<PasswordPolicy>,
    password_updates: Vec<(String, bool)>,
    deleted_keys: Vec<(String, String)>,
    failing_key_creation: HashSet<String>,
}

/// IAM stand-in that keeps users, tags and credentials in memory.
///
/// Listings are paginated with numeric markers so the pagination loops get
/// exercised. Unless a report is set explicitly, the credential report is
/// derived from the stored login profiles.
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
    page_size: usize,
    key_counter: AtomicU64,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState::default()),
            page_size: 100,
            key_counter: AtomicU64::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn add_user(&self, user_name: &str) {
        let mut state = lock(&self.state);
        if !state.users.iter().any(|u| u == user_name) {
            state.users.push(user_name.to_string());
        }
    }

    pub fn remove_user(&self, user_name: &str) {
        let mut state = lock(&self.state);
        state.users.retain(|u| u != user_name);
        state.tags.remove(user_name);
        state.login_profiles.remove(user_name);
        state.access_keys.remove(user_name);
    }

    pub fn set_tag(&self, user_name: &str, key: &str, value: &str) {
        let mut state = lock(&self.state);
        let tags = state.tags.entry(user_name.to_string()).or_default();
        tags.retain(|(k, _)| k != key);
        tags.push((key.to_string(), value.to_string()));
    }

    pub fn set_login_profile(&self, user_name: &str, created: DateTime<Utc>) {
        lock(&self.state)
            .login_profiles
            .insert(user_name.to_string(), created);
    }

    pub fn add_access_key(
        &self,
        user_name: &str,
        access_key_id: &str,
        created: DateTime<Utc>,
        status: AccessKeyStatus,
    ) {
        lock(&self.state)
            .access_keys
            .entry(user_name.to_string())
            .or_default()
            .push(AccessKeyMetadata {
                access_key_id: access_key_id.to_string(),
                create_date: created,
                status,
            });
    }

    pub fn set_password_policy(&self, policy: PasswordPolicy) {
        lock(&self.state).policy = Some(policy);
    }

    /// Raw report content returned instead of the derived one.
    pub fn set_report(&self, content: &[u8]) {
        lock(&self.state).report = Some(content.to_vec());
    }

    /// States returned by successive report generation calls; `Complete`
    /// once exhausted.
    pub fn with_report_states(self, states: impl IntoIterator<Item = ReportState>) -> Self {
        lock(&self.state).report_states = states.into_iter().collect();
        self
    }

    pub fn fail_key_creation_for(&self, user_name: &str) {
        lock(&self.state)
            .failing_key_creation
            .insert(user_name.to_string());
    }

    pub fn report_requests(&self) -> u32 {
        lock(&self.state).report_requests
    }

    /// `(user, password_reset_required)` for every console password update.
    pub fn password_updates(&self) -> Vec<(String, bool)> {
        lock(&self.state).password_updates.clone()
    }

    pub fn deleted_keys(&self) -> Vec<(String, String)> {
        lock(&self.state).deleted_keys.clone()
    }

    pub fn access_key_ids(&self, user_name: &str) -> Vec<String> {
        lock(&self.state)
            .access_keys
            .get(user_name)
            .map(|keys| keys.iter().map(|k| k.access_key_id.clone()).collect())
            .unwrap_or_default()
    }

    fn derived_report(state: &DirectoryState) -> Vec<u8> {
        let mut csv = String::from("user,password_enabled,password_last_changed\n");
        for user in &state.users {
            let changed = state
                .password_changed
                .get(user)
                .or_else(|| state.login_profiles.get(user));
            match changed {
                Some(date) => csv.push_str(&format!("{},true,{}\n", user, date.to_rfc3339())),
                None => csv.push_str(&format!("{},false,N/A\n", user)),
            }
        }
        csv.into_bytes()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn list_users(&self, marker: Option<String>) -> Result<Page<DirectoryUser>, AppError> {
        let users: Vec<DirectoryUser> = lock(&self.state)
            .users
            .iter()
            .enumerate()
            .map(|(idx, name)| DirectoryUser {
                user_name: name.clone(),
                user_id: format!("AIDAMOCK{:08}", idx),
            })
            .collect();
        paginate(&users, marker, self.page_size)
    }

    async fn list_user_tags(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<(String, String)>, AppError> {
        let tags = lock(&self.state)
            .tags
            .get(user_name)
            .cloned()
            .unwrap_or_default();
        paginate(&tags, marker, self.page_size)
    }

    async fn get_login_profile(&self, user_name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        Ok(lock(&self.state).login_profiles.get(user_name).copied())
    }

    async fn list_access_keys(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<AccessKeyMetadata>, AppError> {
        let keys = lock(&self.state)
            .access_keys
            .get(user_name)
            .cloned()
            .unwrap_or_default();
        paginate(&keys, marker, self.page_size)
    }

    async fn generate_credential_report(&self) -> Result<ReportState, AppError> {
        let mut state = lock(&self.state);
        state.report_requests += 1;
        Ok(state
            .report_states
            .pop_front()
            .unwrap_or(ReportState::Complete))
    }

    async fn get_credential_report(&self) -> Result<Vec<u8>, AppError> {
        let state = lock(&self.state);
        Ok(state
            .report
            .clone()
            .unwrap_or_else(|| Self::derived_report(&state)))
    }

    async fn password_policy(&self) -> Result<Option<PasswordPolicy>, AppError> {
        Ok(lock(&self.state).policy.clone())
    }
}

#[async_trait]
impl CredentialStore for InMemoryDirectory {
    async fn update_login_profile(
        &self,
        user_name: &str,
        _password: &SecretString,
        password_reset_required: bool,
    ) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        if !state.login_profiles.contains_key(user_name) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "login profile for {} not found",
                user_name
            )));
        }
        state
            .password_changed
            .insert(user_name.to_string(), Utc::now());
        state
            .password_updates
            .push((user_name.to_string(), password_reset_required));
        Ok(())
    }

    async fn delete_access_key(
        &self,
        user_name: &str,
        access_key_id: &str,
    ) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        let keys = state.access_keys.entry(user_name.to_string()).or_default();
        let before = keys.len();
        keys.retain(|key| key.access_key_id != access_key_id);
        if keys.len() == before {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "access key {} not found for {}",
                access_key_id,
                user_name
            )));
        }
        state
            .deleted_keys
            .push((user_name.to_string(), access_key_id.to_string()));
        Ok(())
    }

    async fn create_access_key(&self, user_name: &str) -> Result<NewAccessKey, AppError> {
        let mut state = lock(&self.state);
        if state.failing_key_creation.contains(user_name) {
            return Err(AppError::Aws(anyhow::anyhow!(
                "CreateAccessKey failed: service unavailable"
            )));
        }

        let keys = state.access_keys.entry(user_name.to_string()).or_default();
        if keys.len() >= MAX_ACCESS_KEYS_PER_USER {
            return Err(AppError::Aws(anyhow::anyhow!(
                "CreateAccessKey failed: LimitExceeded for {}",
                user_name
            )));
        }

        let seq = self.key_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let key = NewAccessKey {
            access_key_id: format!("AKIAMOCK{:08}", seq),
            secret_access_key: SecretString::new(format!("mock-secret-{}", seq)),
            create_date: Utc::now(),
        };
        keys.push(AccessKeyMetadata {
            access_key_id: key.access_key_id.clone(),
            create_date: key.create_date,
            status: AccessKeyStatus::Active,
        });
        Ok(key)
    }
}

/// Identity verifier with fixed statuses; unknown identities are `Unknown`.
#[derive(Clone, Default)]
pub struct MockIdentityVerifier {
    statuses: Arc<Mutex<HashMap<String, VerificationStatus>>>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl MockIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(self, identity: &str, status: VerificationStatus) -> Self {
        self.set_status(identity, status);
        self
    }

    /// Visible through every clone.
    pub fn set_status(&self, identity: &str, status: VerificationStatus) {
        lock(&self.statuses).insert(identity.to_string(), status);
    }

    pub fn lookups(&self) -> Vec<String> {
        lock(&self.lookups).clone()
    }
}

#[async_trait]
impl IdentityVerifier for MockIdentityVerifier {
    async fn verification_status(&self, identity: &str) -> Result<VerificationStatus, AppError> {
        lock(&self.lookups).push(identity.to_string());
        Ok(lock(&self.statuses)
            .get(identity)
            .copied()
            .unwrap_or(VerificationStatus::Unknown))
    }
}

/// Mock email provider for testing
#[derive(Default)]
pub struct MockEmailProvider {
    failing: bool,
    sent: Mutex<Vec<EmailMessage>>,
    send_count: AtomicU64,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<Option<String>, AppError> {
        if self.failing {
            return Err(AppError::EmailError("mock transport refused message".to_string()));
        }

        let seq = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.sent).push(email.clone());

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "[MOCK] Email would be sent"
        );

        Ok(Some(format!("mock-email-{}", seq)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedMessage>,
    in_flight: HashMap<String, QueuedMessage>,
    acknowledged: Vec<String>,
    next_handle: u64,
}

/// FIFO request queue with visibility tracking.
#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an arbitrary body, bypassing request encoding.
    pub fn push_raw(&self, body: &str) {
        let mut state = lock(&self.state);
        state.next_handle += 1;
        let handle = format!("receipt-{}", state.next_handle);
        state.pending.push_back(QueuedMessage {
            receipt_handle: handle,
            body: body.to_string(),
        });
    }

    /// Decoded requests still waiting to be received.
    pub fn pending_requests(&self) -> Vec<RefreshCredentialRequest> {
        lock(&self.state)
            .pending
            .iter()
            .filter_map(|message| RefreshCredentialRequest::from_json(&message.body).ok())
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        lock(&self.state).in_flight.len()
    }

    pub fn acknowledged(&self) -> Vec<String> {
        lock(&self.state).acknowledged.clone()
    }
}

#[async_trait]
impl RequestQueue for InMemoryQueue {
    async fn enqueue(&self, request: &RefreshCredentialRequest) -> Result<(), AppError> {
        let body = request.to_json()?;
        self.push_raw(&body);
        Ok(())
    }

    async fn receive(&self, max_messages: i32) -> Result<Vec<QueuedMessage>, AppError> {
        let mut state = lock(&self.state);
        let max = usize::try_from(max_messages).unwrap_or(0);
        let mut received = Vec::new();
        while received.len() < max {
            let Some(message) = state.pending.pop_front() else {
                break;
            };
            state
                .in_flight
                .insert(message.receipt_handle.clone(), message.clone());
            received.push(message);
        }
        Ok(received)
    }

    async fn acknowledge(&self, message: &QueuedMessage) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        if state.in_flight.remove(&message.receipt_handle).is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "receipt handle {} is not in flight",
                message.receipt_handle
            )));
        }
        state.acknowledged.push(message.receipt_handle.clone());
        Ok(())
    }
}

/// Alert publisher that keeps every alert it is given.
#[derive(Default)]
pub struct RecordingAlertPublisher {
    failing: bool,
    alerts: Mutex<Vec<(Severity, String)>>,
}

impl RecordingAlertPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn alerts(&self) -> Vec<(Severity, String)> {
        lock(&self.alerts).clone()
    }

    pub fn messages_with(&self, severity: Severity) -> Vec<String> {
        self.alerts()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, message)| message)
            .collect()
    }
}

#[async_trait]
impl AlertPublisher for RecordingAlertPublisher {
    async fn publish(&self, message: &str, severity: Severity) -> Result<(), AppError> {
        if self.failing {
            return Err(AppError::TransientDependency("alert topic unavailable".to_string()));
        }
        lock(&self.alerts).push((severity, message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginates_with_numeric_markers() {
        let items = vec![1, 2, 3, 4, 5];
        let first = paginate(&items, None, 2).unwrap();
        assert_eq!(first.items, vec![1, 2]);
        assert_eq!(first.marker.as_deref(), Some("2"));

        let last = paginate(&items, Some("4".into()), 2).unwrap();
        assert_eq!(last.items, vec![5]);
        assert_eq!(last.marker, None);

        assert!(paginate(&items, Some("x".into()), 2).is_err());
    }

    #[tokio::test]
    async fn queue_tracks_acknowledgements() {
        let queue = InMemoryQueue::new();
        queue.push_raw("one");
        queue.push_raw("two");

        let received = queue.receive(1).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(queue.pending_len(), 1);
        assert_eq!(queue.in_flight_len(), 1);

        queue.acknowledge(&received[0]).await.unwrap();
        assert_eq!(queue.acknowledged(), vec!["receipt-1".to_string()]);
        assert!(queue.acknowledge(&received[0]).await.is_err());
    }

    #[tokio::test]
    async fn directory_caps_access_keys() {
        let directory = InMemoryDirectory::new();
        directory.add_user("alice");
        directory.create_access_key("alice").await.unwrap();
        directory.create_access_key("alice").await.unwrap();
        assert!(directory.create_access_key("alice").await.is_err());
    }
}
