//! Credential obsolescence policy.
//!
//! [`is_obsolete`] is the single date rule shared by login profiles and access
//! keys. [`ObsolescenceEvaluator`] applies it to a whole user, gated by the
//! email check: nothing is considered due for a user whose destination address
//! is not verified.

use chrono::{Days, NaiveDate};
use service_core::error::AppError;

use crate::models::{AccessKeyInfo, Auditable, LoginProfileInfo, RefreshCredentialRequest};
use crate::services::email_validation::EmailValidator;

/// True when `force` is set, or when `today` is strictly after
/// `create_date + limit_days`. Both sides are calendar days.
pub fn is_obsolete(create_date: NaiveDate, limit_days: u32, force: bool, today: NaiveDate) -> bool {
    if force {
        return true;
    }
    match create_date.checked_add_days(Days::new(u64::from(limit_days))) {
        Some(limit_date) => today > limit_date,
        // Past the end of the calendar: never due.
        None => false,
    }
}

/// Date part of the aggregate rule, without the email gate.
///
/// Under `force` every existing credential is obsolete, so the result is true
/// whenever the user holds at least one credential; an empty set is never due.
pub fn has_obsolete_credentials(
    login_profile: Option<&LoginProfileInfo>,
    access_keys: &[AccessKeyInfo],
    request: &RefreshCredentialRequest,
    today: NaiveDate,
) -> bool {
    login_profile.is_some_and(|profile| profile.is_obsolete(request, today))
        || access_keys.iter().any(|key| key.is_obsolete(request, today))
}

pub struct ObsolescenceEvaluator<'a> {
    email_validator: &'a EmailValidator,
}

impl<'a> ObsolescenceEvaluator<'a> {
    pub fn new(email_validator: &'a EmailValidator) -> Self {
        Self { email_validator }
    }

    /// Whether the request's user should be rotated now.
    ///
    /// Returns `Ok(false)` without looking at dates when the request carries
    /// no email or the email fails validation.
    pub async fn is_request_obsolete(
        &self,
        login_profile: Option<&LoginProfileInfo>,
        access_keys: &[AccessKeyInfo],
        request: &RefreshCredentialRequest,
        today: NaiveDate,
    ) -> Result<bool, AppError> {
        let Some(email) = request.email() else {
            tracing::info!(user = %request.user_name(), "No destination email, skipping");
            return Ok(false);
        };

        if !self
            .email_validator
            .validate(request.user_name(), email)
            .await?
        {
            return Ok(false);
        }

        Ok(has_obsolete_credentials(
            login_profile,
            access_keys,
            request,
            today,
        ))
    }
}
