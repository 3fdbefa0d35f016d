use chrono::NaiveDate;
use service_core::error::AppError;

use super::{
    publish_summary, report_user_failure, AtStage, PassContext, RotationStage, RunSummary,
    SkipReason, UserFailure,
};
use crate::models::RefreshCredentialRequest;
use crate::services::directory::{list_all_users, load_credentials, load_user_tags};
use crate::services::metrics::{record_enqueued, record_user_outcome};
use crate::services::policy::resolve_time_limits;
use crate::startup::AppState;

/// Request for `user_name` carrying its tag email and resolved time limits,
/// or `None` when the user has no email tag.
pub(crate) async fn build_request(
    state: &AppState,
    user_name: &str,
    force: bool,
) -> Result<Option<RefreshCredentialRequest>, UserFailure> {
    let tags = load_user_tags(state.directory.as_ref(), user_name)
        .await
        .at(RotationStage::Discovered)?;
    let Some(email) = tags.email() else {
        return Ok(None);
    };

    let limits = resolve_time_limits(&tags, &state.settings.limits);
    tracing::debug!(
        user = %user_name,
        cli_time_limit = limits.cli,
        login_profile_time_limit = limits.login_profile,
        "Resolved time limits"
    );

    RefreshCredentialRequest::builder(user_name)
        .email(email)
        .time_limits(limits)
        .force(force)
        .build()
        .map(Some)
        .at(RotationStage::RequestBuilt)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanOutcome {
    Enqueued,
    Skipped(SkipReason),
}

async fn scan_user(
    state: &AppState,
    ctx: &PassContext,
    user_name: &str,
    today: NaiveDate,
) -> Result<ScanOutcome, UserFailure> {
    let Some(request) = build_request(state, user_name, false).await? else {
        tracing::debug!(user = %user_name, "No destination email tag, skipping");
        return Ok(ScanOutcome::Skipped(SkipReason::NoEmail));
    };

    let credentials = load_credentials(state.directory.as_ref(), Some(&ctx.report), user_name)
        .await
        .at(RotationStage::Discovered)?;

    let due = ctx
        .evaluator()
        .is_request_obsolete(
            credentials.login_profile.as_ref(),
            &credentials.access_keys,
            &request,
            today,
        )
        .await
        .at(RotationStage::Evaluated)?;
    if !due {
        return Ok(ScanOutcome::Skipped(SkipReason::NotDue));
    }

    state
        .queue()
        .at(RotationStage::Enqueued)?
        .enqueue(&request)
        .await
        .at(RotationStage::Enqueued)?;
    record_enqueued();
    tracing::info!(user = %user_name, "Refresh request enqueued");

    Ok(ScanOutcome::Enqueued)
}

/// Producer pass: enqueue a refresh request for every user with obsolete
/// credentials. Nothing is rotated here; the consumer re-evaluates.
#[tracing::instrument(skip(state))]
pub async fn scan(state: &AppState, today: NaiveDate) -> Result<RunSummary, AppError> {
    // Fail before walking the directory when there is nowhere to enqueue.
    state.queue()?;

    let ctx = PassContext::prepare(state).await?;
    let users = list_all_users(state.directory.as_ref()).await?;
    tracing::info!(users = users.len(), "Scanning users");

    let mut summary = RunSummary::default();
    for user in &users {
        summary.users += 1;
        match scan_user(state, &ctx, &user.user_name, today).await {
            Ok(ScanOutcome::Enqueued) => {
                summary.enqueued += 1;
                record_user_outcome("enqueued");
            }
            Ok(ScanOutcome::Skipped(_)) => {
                summary.skipped += 1;
                record_user_outcome("skipped");
            }
            Err(failure) => {
                summary.failed += 1;
                record_user_outcome("failed");
                report_user_failure(state, &user.user_name, &failure).await;
            }
        }
    }

    publish_summary(state, "scan", &summary).await;
    Ok(summary)
}
