use service_core::error::AppError;

use super::scan::build_request;
use crate::models::RefreshCredentialRequest;
use crate::services::metrics::record_enqueued;
use crate::services::EmailValidator;
use crate::startup::AppState;

/// Manually enqueue a refresh request for one user.
///
/// Unlike a scan, the request is enqueued whether or not anything is due;
/// the consumer still decides what to rotate unless `force` is set.
#[tracing::instrument(skip(state))]
pub async fn enqueue_request(
    state: &AppState,
    user_name: &str,
    force: bool,
) -> Result<RefreshCredentialRequest, AppError> {
    let queue = state.queue()?;

    let request = build_request(state, user_name, force)
        .await
        .map_err(|failure| failure.error)?
        .ok_or_else(|| {
            AppError::ValidationError(format!(
                "user {} has no IamRotateCredentials:Email tag",
                user_name
            ))
        })?;

    let email = request.email().unwrap_or_default();
    let validator = EmailValidator::new(state.verifier.clone(), state.alerter.clone());
    if !validator.validate(user_name, email).await? {
        return Err(AppError::UnverifiedEmail(email.to_string()));
    }

    queue.enqueue(&request).await?;
    record_enqueued();
    tracing::info!(request = %request, "Refresh request enqueued");
    Ok(request)
}

