//! Applies rotations to IAM.

use chrono::NaiveDate;
use service_core::error::AppError;
use std::sync::Arc;

use crate::models::{
    AccessKeyInfo, Auditable, CredentialKind, LoginProfileInfo, RefreshCredentialRequest,
    UserCredentials,
};
use crate::services::directory::{CredentialStore, PasswordPolicy};
use crate::services::metrics::record_rotation;
use crate::services::password::generate_password;

/// What one user's rotation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationSummary {
    pub login_profile_rotated: bool,
    pub access_keys_rotated: usize,
}

impl RotationSummary {
    pub fn is_empty(&self) -> bool {
        !self.login_profile_rotated && self.access_keys_rotated == 0
    }
}

pub struct RotationExecutor {
    store: Arc<dyn CredentialStore>,
    password_policy: Option<PasswordPolicy>,
    password_reset_required: bool,
}

impl RotationExecutor {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        password_policy: Option<PasswordPolicy>,
        password_reset_required: bool,
    ) -> Self {
        Self {
            store,
            password_policy,
            password_reset_required,
        }
    }

    pub async fn rotate_login_profile(
        &self,
        user_name: &str,
        profile: &mut LoginProfileInfo,
    ) -> Result<(), AppError> {
        let password = generate_password(self.password_policy.as_ref());
        self.store
            .update_login_profile(user_name, &password, self.password_reset_required)
            .await?;

        profile.mark_rotated(password, chrono::Utc::now());
        record_rotation(CredentialKind::LoginProfile);
        tracing::info!(
            user = %user_name,
            reset_required = self.password_reset_required,
            "New password generated for console access"
        );
        Ok(())
    }

    /// Delete the key, then create its replacement. IAM caps users at two
    /// keys, so the old one has to go first.
    pub async fn rotate_access_key(
        &self,
        user_name: &str,
        key: &mut AccessKeyInfo,
    ) -> Result<(), AppError> {
        let old_id = key.id().to_string();
        self.store.delete_access_key(user_name, &old_id).await?;

        let created = self.store.create_access_key(user_name).await?;
        key.mark_rotated(
            created.access_key_id,
            created.secret_access_key,
            created.create_date,
        );
        record_rotation(CredentialKind::AccessKey);
        tracing::info!(
            user = %user_name,
            old_access_key = %old_id,
            new_access_key = %key.id(),
            "New access key generated"
        );
        Ok(())
    }

    /// Rotate every credential of `credentials` that `request` finds obsolete.
    pub async fn rotate_obsolete(
        &self,
        credentials: &mut UserCredentials,
        request: &RefreshCredentialRequest,
        today: NaiveDate,
    ) -> Result<RotationSummary, AppError> {
        let mut summary = RotationSummary::default();
        let user_name = credentials.user_name.clone();

        if let Some(profile) = credentials.login_profile.as_mut() {
            if profile.is_obsolete(request, today) {
                self.rotate_login_profile(&user_name, profile).await?;
                summary.login_profile_rotated = true;
            }
        }

        for key in credentials.access_keys.iter_mut() {
            if key.is_obsolete(request, today) {
                self.rotate_access_key(&user_name, key).await?;
                summary.access_keys_rotated += 1;
            }
        }

        Ok(summary)
    }
}
