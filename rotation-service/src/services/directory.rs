//! Directory lookups and credential writes, plus the pagination loops over them.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use secrecy::SecretString;
use service_core::error::AppError;

use crate::models::{AccessKeyInfo, CredentialReport, LoginProfileInfo, UserCredentials, UserTags};

/// One page of a marker-paginated listing. `marker` is set when more pages
/// remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub marker: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            marker: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub user_name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKeyStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyMetadata {
    pub access_key_id: String,
    pub create_date: DateTime<Utc>,
    pub status: AccessKeyStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    Started,
    InProgress,
    Complete,
}

/// Subset of the account password policy that shapes generated passwords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub minimum_length: Option<u32>,
    pub require_symbols: bool,
    pub require_numbers: bool,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
}

#[derive(Debug, Clone)]
pub struct NewAccessKey {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub create_date: DateTime<Utc>,
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn list_users(&self, marker: Option<String>) -> Result<Page<DirectoryUser>, AppError>;

    async fn list_user_tags(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<(String, String)>, AppError>;

    /// Creation date of the user's console login profile, `None` when the
    /// user has no console access.
    async fn get_login_profile(&self, user_name: &str) -> Result<Option<DateTime<Utc>>, AppError>;

    async fn list_access_keys(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<AccessKeyMetadata>, AppError>;

    async fn generate_credential_report(&self) -> Result<ReportState, AppError>;

    async fn get_credential_report(&self) -> Result<Vec<u8>, AppError>;

    async fn password_policy(&self) -> Result<Option<PasswordPolicy>, AppError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn update_login_profile(
        &self,
        user_name: &str,
        password: &SecretString,
        password_reset_required: bool,
    ) -> Result<(), AppError>;

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str)
        -> Result<(), AppError>;

    async fn create_access_key(&self, user_name: &str) -> Result<NewAccessKey, AppError>;
}

pub async fn list_all_users(directory: &dyn Directory) -> Result<Vec<DirectoryUser>, AppError> {
    let mut users = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page = directory.list_users(marker.take()).await?;
        users.extend(page.items);
        match page.marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    Ok(users)
}

pub async fn load_user_tags(directory: &dyn Directory, user_name: &str) -> Result<UserTags, AppError> {
    let mut tags = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page = directory.list_user_tags(user_name, marker.take()).await?;
        tags.extend(page.items);
        match page.marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    Ok(tags.into_iter().collect())
}

/// Active keys only; inactive keys are never rotated.
pub async fn list_active_access_keys(
    directory: &dyn Directory,
    user_name: &str,
) -> Result<Vec<AccessKeyInfo>, AppError> {
    let mut keys = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page = directory.list_access_keys(user_name, marker.take()).await?;
        keys.extend(
            page.items
                .into_iter()
                .filter(|key| key.status == AccessKeyStatus::Active)
                .map(|key| AccessKeyInfo::new(key.access_key_id, key.create_date)),
        );
        match page.marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    Ok(keys)
}

/// Current credentials of one user.
///
/// A console password is dated by the credential report's
/// `password_last_changed` when available, else by the profile's creation.
pub async fn load_credentials(
    directory: &dyn Directory,
    report: Option<&CredentialReport>,
    user_name: &str,
) -> Result<UserCredentials, AppError> {
    let mut credentials = UserCredentials::new(user_name);

    if let Some(profile_created) = directory.get_login_profile(user_name).await? {
        let changed = report
            .and_then(|report| report.password_last_changed(user_name))
            .map(|date| date.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or(profile_created);
        credentials.login_profile = Some(LoginProfileInfo::new(changed));
    }

    credentials.access_keys = list_active_access_keys(directory, user_name).await?;
    Ok(credentials)
}
