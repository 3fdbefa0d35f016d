use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::fmt;
use validator::{Validate, ValidationError};

use super::credential::CredentialKind;

/// Time limits, in days, resolved for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLimits {
    pub cli: u32,
    pub login_profile: u32,
}

impl TimeLimits {
    pub fn new(cli: u32, login_profile: u32) -> Self {
        Self { cli, login_profile }
    }
}

/// Wire shape of a refresh request as it travels through the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_time_limits"))]
pub struct RefreshCredentialPayload {
    #[validate(custom(function = "validate_user_name"))]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_time_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_profile_time_limit: Option<u32>,
}

fn validate_user_name(user_name: &str) -> Result<(), ValidationError> {
    if user_name.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("user_name is required".into());
        return Err(err);
    }
    Ok(())
}

fn validate_time_limits(payload: &RefreshCredentialPayload) -> Result<(), ValidationError> {
    if !payload.force
        && (payload.cli_time_limit.is_none() || payload.login_profile_time_limit.is_none())
    {
        let mut err = ValidationError::new("time_limits");
        err.message =
            Some("cli_time_limit and login_profile_time_limit are required unless force".into());
        return Err(err);
    }
    Ok(())
}

/// One user's rotation request.
///
/// Only constructed through [`RefreshCredentialRequest::builder`] or by
/// deserializing a queue message; both paths reject a non-forced request
/// without time limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RefreshCredentialPayload", into = "RefreshCredentialPayload")]
pub struct RefreshCredentialRequest {
    user_name: String,
    email: Option<String>,
    force: bool,
    cli_time_limit: Option<u32>,
    login_profile_time_limit: Option<u32>,
}

impl RefreshCredentialRequest {
    pub fn builder(user_name: impl Into<String>) -> RefreshCredentialRequestBuilder {
        RefreshCredentialRequestBuilder {
            payload: RefreshCredentialPayload {
                user_name: user_name.into(),
                ..Default::default()
            },
        }
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn cli_time_limit(&self) -> Option<u32> {
        self.cli_time_limit
    }

    pub fn login_profile_time_limit(&self) -> Option<u32> {
        self.login_profile_time_limit
    }

    /// Same request addressed to `email` instead.
    pub fn with_email(mut self, email: Option<&str>) -> Self {
        self.email = email.map(str::to_string);
        self
    }

    pub fn time_limit(&self, kind: CredentialKind) -> Option<u32> {
        match kind {
            CredentialKind::LoginProfile => self.login_profile_time_limit,
            CredentialKind::AccessKey => self.cli_time_limit,
        }
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(body: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(body)?)
    }
}

impl TryFrom<RefreshCredentialPayload> for RefreshCredentialRequest {
    type Error = AppError;

    fn try_from(payload: RefreshCredentialPayload) -> Result<Self, Self::Error> {
        payload.validate()?;
        Ok(Self {
            user_name: payload.user_name,
            email: payload.email,
            force: payload.force,
            cli_time_limit: payload.cli_time_limit,
            login_profile_time_limit: payload.login_profile_time_limit,
        })
    }
}

impl From<RefreshCredentialRequest> for RefreshCredentialPayload {
    fn from(request: RefreshCredentialRequest) -> Self {
        Self {
            user_name: request.user_name,
            email: request.email,
            force: request.force,
            cli_time_limit: request.cli_time_limit,
            login_profile_time_limit: request.login_profile_time_limit,
        }
    }
}

impl fmt::Display for RefreshCredentialRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_name)?;
        if self.force {
            write!(f, " (forced)")?;
        }
        Ok(())
    }
}

pub struct RefreshCredentialRequestBuilder {
    payload: RefreshCredentialPayload,
}

impl RefreshCredentialRequestBuilder {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.payload.email = Some(email.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.payload.force = force;
        self
    }

    pub fn cli_time_limit(mut self, days: u32) -> Self {
        self.payload.cli_time_limit = Some(days);
        self
    }

    pub fn login_profile_time_limit(mut self, days: u32) -> Self {
        self.payload.login_profile_time_limit = Some(days);
        self
    }

    pub fn time_limits(self, limits: TimeLimits) -> Self {
        self.cli_time_limit(limits.cli)
            .login_profile_time_limit(limits.login_profile)
    }

    pub fn build(self) -> Result<RefreshCredentialRequest, AppError> {
        RefreshCredentialRequest::try_from(self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_user_name() {
        let result = RefreshCredentialRequest::builder("  ")
            .time_limits(TimeLimits::new(90, 90))
            .build();
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn build_requires_limits_unless_forced() {
        let missing_login = RefreshCredentialRequest::builder("alice")
            .cli_time_limit(30)
            .build();
        assert!(matches!(missing_login, Err(AppError::ValidationError(_))));

        let forced = RefreshCredentialRequest::builder("alice")
            .force(true)
            .build()
            .expect("forced request needs no limits");
        assert!(forced.force());
        assert_eq!(forced.cli_time_limit(), None);
    }

    #[test]
    fn time_limit_follows_credential_kind() {
        let request = RefreshCredentialRequest::builder("alice")
            .cli_time_limit(90)
            .login_profile_time_limit(30)
            .build()
            .unwrap();

        assert_eq!(request.time_limit(CredentialKind::AccessKey), Some(90));
        assert_eq!(request.time_limit(CredentialKind::LoginProfile), Some(30));
    }

    #[test]
    fn queue_message_is_validated_on_decode() {
        let request = RefreshCredentialRequest::from_json(
            r#"{"user_name":"bob","cli_time_limit":60,"login_profile_time_limit":45}"#,
        )
        .expect("valid message");
        assert_eq!(request.user_name(), "bob");
        assert!(!request.force());

        let err = RefreshCredentialRequest::from_json(r#"{"user_name":"bob"}"#).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = RefreshCredentialRequest::from_json(r#"{"force":true}"#).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn negative_limits_are_rejected() {
        let err = RefreshCredentialRequest::from_json(
            r#"{"user_name":"bob","cli_time_limit":-1,"login_profile_time_limit":45}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn readdressing_keeps_policy() {
        let request = RefreshCredentialRequest::builder("dave")
            .email("old@example.com")
            .time_limits(TimeLimits::new(10, 20))
            .build()
            .unwrap()
            .with_email(Some("new@example.com"));

        assert_eq!(request.email(), Some("new@example.com"));
        assert_eq!(request.cli_time_limit(), Some(10));
        assert_eq!(request.with_email(None).email(), None);
    }

    #[test]
    fn encoded_request_omits_absent_fields() {
        let request = RefreshCredentialRequest::builder("carol")
            .force(true)
            .build()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();

        assert_eq!(json["user_name"], "carol");
        assert_eq!(json["force"], true);
        assert!(json.get("email").is_none());
        assert!(json.get("cli_time_limit").is_none());
    }
}
