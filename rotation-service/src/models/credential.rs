use chrono::{DateTime, NaiveDate, Utc};
use secrecy::SecretString;
use std::fmt;

use super::request::RefreshCredentialRequest;
use crate::services::obsolescence::is_obsolete;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    LoginProfile,
    AccessKey,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::LoginProfile => write!(f, "login_profile"),
            CredentialKind::AccessKey => write!(f, "access_key"),
        }
    }
}

/// A credential whose age is checked against the request's policy.
pub trait Auditable {
    fn kind(&self) -> CredentialKind;

    fn create_date(&self) -> DateTime<Utc>;

    fn is_obsolete(&self, request: &RefreshCredentialRequest, today: NaiveDate) -> bool {
        if request.force() {
            return true;
        }
        match request.time_limit(self.kind()) {
            Some(limit) => is_obsolete(self.create_date().date_naive(), limit, false, today),
            // Unreachable for a validated request.
            None => false,
        }
    }
}

/// Console password record.
#[derive(Debug, Clone)]
pub struct LoginProfileInfo {
    create_date: DateTime<Utc>,
    password: Option<SecretString>,
}

impl LoginProfileInfo {
    pub fn new(create_date: DateTime<Utc>) -> Self {
        Self {
            create_date,
            password: None,
        }
    }

    /// New password, present only after rotation.
    pub fn password(&self) -> Option<&SecretString> {
        self.password.as_ref()
    }

    pub fn mark_rotated(&mut self, password: SecretString, changed_at: DateTime<Utc>) {
        self.password = Some(password);
        self.create_date = changed_at;
    }
}

impl Auditable for LoginProfileInfo {
    fn kind(&self) -> CredentialKind {
        CredentialKind::LoginProfile
    }

    fn create_date(&self) -> DateTime<Utc> {
        self.create_date
    }
}

/// CLI access key record.
#[derive(Debug, Clone)]
pub struct AccessKeyInfo {
    id: String,
    create_date: DateTime<Utc>,
    secret: Option<SecretString>,
}

impl AccessKeyInfo {
    pub fn new(id: impl Into<String>, create_date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            create_date,
            secret: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Secret access key, present only after rotation.
    pub fn secret(&self) -> Option<&SecretString> {
        self.secret.as_ref()
    }

    pub fn is_rotated(&self) -> bool {
        self.secret.is_some()
    }

    pub fn mark_rotated(
        &mut self,
        id: impl Into<String>,
        secret: SecretString,
        created_at: DateTime<Utc>,
    ) {
        self.id = id.into();
        self.secret = Some(secret);
        self.create_date = created_at;
    }
}

impl Auditable for AccessKeyInfo {
    fn kind(&self) -> CredentialKind {
        CredentialKind::AccessKey
    }

    fn create_date(&self) -> DateTime<Utc> {
        self.create_date
    }
}
