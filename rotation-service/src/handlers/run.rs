use chrono::NaiveDate;
use service_core::error::AppError;

use super::scan::build_request;
use super::{
    apply_request, publish_summary, report_user_failure, PassContext, RunSummary, SkipReason,
    UserFailure, UserOutcome,
};
use crate::services::directory::list_all_users;
use crate::startup::AppState;

async fn run_user(
    state: &AppState,
    ctx: &PassContext,
    user_name: &str,
    today: NaiveDate,
) -> Result<UserOutcome, UserFailure> {
    match build_request(state, user_name, false).await? {
        Some(request) => apply_request(state, ctx, request, today).await,
        None => {
            tracing::debug!(user = %user_name, "No destination email tag, skipping");
            Ok(UserOutcome::Skipped(SkipReason::NoEmail))
        }
    }
}

/// Single pass without the queue: discover, evaluate, rotate and notify
/// every user in turn.
#[tracing::instrument(skip(state))]
pub async fn run(state: &AppState, today: NaiveDate) -> Result<RunSummary, AppError> {
    let ctx = PassContext::prepare(state).await?;
    let users = list_all_users(state.directory.as_ref()).await?;
    tracing::info!(users = users.len(), "Starting rotation pass");

    let mut summary = RunSummary::default();
    for user in &users {
        let outcome = run_user(state, &ctx, &user.user_name, today).await;
        if let Err(failure) = &outcome {
            report_user_failure(state, &user.user_name, failure).await;
        }
        summary.record(&outcome);
    }

    publish_summary(state, "run", &summary).await;
    Ok(summary)
}
