use std::collections::HashMap;

use super::credential::{AccessKeyInfo, LoginProfileInfo};

pub const EMAIL_TAG: &str = "IamRotateCredentials:Email";
pub const CLI_TIME_LIMIT_TAG: &str = "IamRotateCredentials:CliTimeLimit";
pub const LOGIN_PROFILE_TIME_LIMIT_TAG: &str = "IamRotateCredentials:LoginProfileTimeLimit";

/// Rotation-related tags attached to an IAM user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserTags {
    values: HashMap<String, String>,
}

impl UserTags {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn email(&self) -> Option<&str> {
        self.get(EMAIL_TAG).filter(|email| !email.trim().is_empty())
    }

    pub fn cli_time_limit(&self) -> Option<&str> {
        self.get(CLI_TIME_LIMIT_TAG)
    }

    pub fn login_profile_time_limit(&self) -> Option<&str> {
        self.get(LOGIN_PROFILE_TIME_LIMIT_TAG)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The credentials one user currently holds.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_name: String,
    pub login_profile: Option<LoginProfileInfo>,
    pub access_keys: Vec<AccessKeyInfo>,
}

impl UserCredentials {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            login_profile: None,
            access_keys: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.login_profile.is_none() && self.access_keys.is_empty()
    }

    /// Whether any credential carries a freshly issued secret.
    pub fn has_rotated(&self) -> bool {
        self.login_profile
            .as_ref()
            .is_some_and(|profile| profile.password().is_some())
            || self.access_keys.iter().any(AccessKeyInfo::is_rotated)
    }
}
