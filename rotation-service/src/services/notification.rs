//! Delivery of freshly rotated credentials to their owner.

use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::sync::Arc;

use crate::models::{AccountInfo, UserCredentials};
use crate::services::providers::{EmailMessage, EmailProvider};

pub fn subject(account: &AccountInfo) -> String {
    format!(
        "Update Amazon WebService credentials for {} by IAMRotateCredentials",
        account.id
    )
}

/// Plain-text body listing every rotated credential of `credentials`.
///
/// Credentials that were not rotated in this run are left out.
pub fn compose_body(
    account: &AccountInfo,
    credentials: &UserCredentials,
    password_reset_required: bool,
    sent_by: Option<&str>,
) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "This email is sent automatically when your credentials become obsolete for account {}.\n",
        account
    ));
    body.push('\n');

    if let Some(password) = credentials
        .login_profile
        .as_ref()
        .and_then(|profile| profile.password())
    {
        body.push_str("Your new Console Access:\n");
        body.push_str(&format!("\tUrl : {}\n", account.console_url()));
        body.push_str(&format!("\tLogin: {}\n", credentials.user_name));
        body.push_str(&format!("\tPassword: {}\n", password.expose_secret()));
        body.push('\n');
        if password_reset_required {
            body.push_str(
                "For your Console Access, you will need to change your password at the next login.\n",
            );
            body.push('\n');
        }
    }

    for key in credentials.access_keys.iter().filter(|key| key.is_rotated()) {
        let Some(secret) = key.secret() else { continue };
        body.push_str("Your new Command LIne Access:\n");
        body.push_str(&format!("\tAccess Key: {}\n", key.id()));
        body.push_str(&format!("\tSecret Key: {}\n", secret.expose_secret()));
    }
    body.push('\n');

    if let Some(sent_by) = sent_by.filter(|s| !s.trim().is_empty()) {
        body.push_str(&format!("by {}.\n", sent_by));
    }

    body
}

/// Mails rotated credentials through the configured provider.
#[derive(Clone)]
pub struct CredentialNotifier {
    provider: Arc<dyn EmailProvider>,
    from: String,
    sent_by: Option<String>,
    password_reset_required: bool,
}

impl CredentialNotifier {
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        from: impl Into<String>,
        sent_by: Option<String>,
        password_reset_required: bool,
    ) -> Self {
        Self {
            provider,
            from: from.into(),
            sent_by,
            password_reset_required,
        }
    }

    pub fn compose(
        &self,
        account: &AccountInfo,
        to: &str,
        credentials: &UserCredentials,
    ) -> EmailMessage {
        EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject(account),
            body_text: compose_body(
                account,
                credentials,
                self.password_reset_required,
                self.sent_by.as_deref(),
            ),
        }
    }

    pub async fn notify(
        &self,
        account: &AccountInfo,
        to: &str,
        credentials: &UserCredentials,
    ) -> Result<(), AppError> {
        let message = self.compose(account, to, credentials);
        let message_id = self.provider.send(&message).await?;

        tracing::info!(
            user = %credentials.user_name,
            to = %to,
            provider = self.provider.name(),
            message_id = ?message_id,
            "New credentials sent"
        );
        Ok(())
    }
}
