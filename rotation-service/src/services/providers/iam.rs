use async_trait::async_trait;
use aws_sdk_iam::primitives::DateTime as AwsDateTime;
use aws_sdk_iam::types::{ReportStateType, StatusType};
use aws_sdk_iam::Client as IamClient;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use service_core::error::AppError;

use super::aws_error;
use crate::services::directory::{
    AccessKeyMetadata, AccessKeyStatus, CredentialStore, Directory, DirectoryUser, NewAccessKey,
    Page, PasswordPolicy, ReportState,
};

/// IAM-backed directory and credential store.
#[derive(Clone, Debug)]
pub struct IamDirectory {
    client: IamClient,
}

impl IamDirectory {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }
}

fn to_utc(date: &AwsDateTime) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(date.secs(), date.subsec_nanos()).ok_or_else(|| {
        AppError::Aws(anyhow::anyhow!("timestamp out of range: {}", date))
    })
}

fn next_marker(is_truncated: bool, marker: Option<&str>) -> Option<String> {
    if is_truncated {
        marker.map(str::to_string)
    } else {
        None
    }
}

#[async_trait]
impl Directory for IamDirectory {
    async fn list_users(&self, marker: Option<String>) -> Result<Page<DirectoryUser>, AppError> {
        let output = self
            .client
            .list_users()
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| aws_error("ListUsers", e))?;

        let items = output
            .users()
            .iter()
            .map(|user| DirectoryUser {
                user_name: user.user_name().to_string(),
                user_id: user.user_id().to_string(),
            })
            .collect();

        Ok(Page {
            items,
            marker: next_marker(output.is_truncated(), output.marker()),
        })
    }

    async fn list_user_tags(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<(String, String)>, AppError> {
        let output = self
            .client
            .list_user_tags()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| aws_error("ListUserTags", e))?;

        let items = output
            .tags()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect();

        Ok(Page {
            items,
            marker: next_marker(output.is_truncated(), output.marker()),
        })
    }

    async fn get_login_profile(&self, user_name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        let result = self
            .client
            .get_login_profile()
            .user_name(user_name)
            .send()
            .await;

        match result {
            Ok(output) => output
                .login_profile()
                .map(|profile| to_utc(profile.create_date()))
                .transpose(),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(aws_error("GetLoginProfile", err)),
        }
    }

    async fn list_access_keys(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<AccessKeyMetadata>, AppError> {
        let result = self
            .client
            .list_access_keys()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                return Ok(Page::last(Vec::new()));
            }
            Err(err) => return Err(aws_error("ListAccessKeys", err)),
        };

        let mut items = Vec::new();
        for key in output.access_key_metadata() {
            let (Some(id), Some(created)) = (key.access_key_id(), key.create_date()) else {
                tracing::warn!(user = %user_name, "Skipping access key with incomplete metadata");
                continue;
            };
            let status = match key.status() {
                Some(StatusType::Active) => AccessKeyStatus::Active,
                _ => AccessKeyStatus::Inactive,
            };
            items.push(AccessKeyMetadata {
                access_key_id: id.to_string(),
                create_date: to_utc(created)?,
                status,
            });
        }

        Ok(Page {
            items,
            marker: next_marker(output.is_truncated(), output.marker()),
        })
    }

    async fn generate_credential_report(&self) -> Result<ReportState, AppError> {
        let output = self
            .client
            .generate_credential_report()
            .send()
            .await
            .map_err(|e| aws_error("GenerateCredentialReport", e))?;

        Ok(match output.state() {
            Some(ReportStateType::Complete) => ReportState::Complete,
            Some(ReportStateType::Inprogress) => ReportState::InProgress,
            _ => ReportState::Started,
        })
    }

    async fn get_credential_report(&self) -> Result<Vec<u8>, AppError> {
        let result = self.client.get_credential_report().send().await;

        match result {
            Ok(output) => output
                .content()
                .map(|blob| blob.as_ref().to_vec())
                .ok_or_else(|| {
                    AppError::TransientDependency("credential report has no content".to_string())
                }),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_credential_report_not_ready_exception()) =>
            {
                Err(AppError::TransientDependency(
                    "credential report not ready".to_string(),
                ))
            }
            Err(err) => Err(aws_error("GetCredentialReport", err)),
        }
    }

    async fn password_policy(&self) -> Result<Option<PasswordPolicy>, AppError> {
        let result = self.client.get_account_password_policy().send().await;

        match result {
            Ok(output) => Ok(output.password_policy().map(|policy| PasswordPolicy {
                minimum_length: policy
                    .minimum_password_length()
                    .and_then(|len| u32::try_from(len).ok()),
                require_symbols: policy.require_symbols(),
                require_numbers: policy.require_numbers(),
                require_uppercase: policy.require_uppercase_characters(),
                require_lowercase: policy.require_lowercase_characters(),
            })),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(aws_error("GetAccountPasswordPolicy", err)),
        }
    }
}

#[async_trait]
impl CredentialStore for IamDirectory {
    async fn update_login_profile(
        &self,
        user_name: &str,
        password: &SecretString,
        password_reset_required: bool,
    ) -> Result<(), AppError> {
        self.client
            .update_login_profile()
            .user_name(user_name)
            .password(password.expose_secret())
            .password_reset_required(password_reset_required)
            .send()
            .await
            .map_err(|e| aws_error("UpdateLoginProfile", e))?;
        Ok(())
    }

    async fn delete_access_key(
        &self,
        user_name: &str,
        access_key_id: &str,
    ) -> Result<(), AppError> {
        self.client
            .delete_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| aws_error("DeleteAccessKey", e))?;
        Ok(())
    }

    async fn create_access_key(&self, user_name: &str) -> Result<NewAccessKey, AppError> {
        let output = self
            .client
            .create_access_key()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| aws_error("CreateAccessKey", e))?;

        let key = output.access_key().ok_or_else(|| {
            AppError::Aws(anyhow::anyhow!("CreateAccessKey returned no key"))
        })?;

        let create_date = match key.create_date() {
            Some(date) => to_utc(date)?,
            None => Utc::now(),
        };

        Ok(NewAccessKey {
            access_key_id: key.access_key_id().to_string(),
            secret_access_key: SecretString::new(key.secret_access_key().to_string()),
            create_date,
        })
    }
}
