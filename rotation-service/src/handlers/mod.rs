//! Command handlers.
//!
//! A user moves through `Discovered → RequestBuilt → Enqueued → Evaluated →
//! RotationApplied → Notified`. A failure aborts that user only; it is logged,
//! alerted and counted, and the pass moves on to the next user.

pub mod consume;
pub mod health;
pub mod request;
pub mod run;
pub mod scan;

use chrono::NaiveDate;
use serde::Serialize;
use service_core::error::AppError;
use std::fmt;

use crate::models::{CredentialReport, RefreshCredentialRequest};
use crate::services::directory::{load_credentials, load_user_tags};
use crate::services::executor::{RotationExecutor, RotationSummary};
use crate::services::metrics::record_user_outcome;
use crate::services::notification::CredentialNotifier;
use crate::services::report::fetch_credential_report;
use crate::services::{EmailValidator, ObsolescenceEvaluator, Severity};
use crate::startup::AppState;

pub use consume::{consume, handle_event, SqsEvent, SqsRecord};
pub use health::HealthState;
pub use request::enqueue_request;
pub use run::run;
pub use scan::scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStage {
    Discovered,
    RequestBuilt,
    Enqueued,
    Evaluated,
    RotationApplied,
    Notified,
}

impl fmt::Display for RotationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationStage::Discovered => "discovered",
            RotationStage::RequestBuilt => "request_built",
            RotationStage::Enqueued => "enqueued",
            RotationStage::Evaluated => "evaluated",
            RotationStage::RotationApplied => "rotation_applied",
            RotationStage::Notified => "notified",
        };
        f.write_str(name)
    }
}

/// A per-user failure and the stage it happened in.
#[derive(Debug)]
pub struct UserFailure {
    pub stage: RotationStage,
    pub error: AppError,
}

impl fmt::Display for UserFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (while {})", self.error, self.stage)
    }
}

pub(crate) trait AtStage<T> {
    fn at(self, stage: RotationStage) -> Result<T, UserFailure>;
}

impl<T> AtStage<T> for Result<T, AppError> {
    fn at(self, stage: RotationStage) -> Result<T, UserFailure> {
        self.map_err(|error| UserFailure { stage, error })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No `IamRotateCredentials:Email` tag.
    NoEmail,
    /// Nothing obsolete, or the destination email was rejected.
    NotDue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    Rotated(RotationSummary),
    Skipped(SkipReason),
}

/// Counters for one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub users: usize,
    pub enqueued: usize,
    pub rotated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub(crate) fn record(&mut self, outcome: &Result<UserOutcome, UserFailure>) {
        self.users += 1;
        match outcome {
            Ok(UserOutcome::Rotated(_)) => {
                self.rotated += 1;
                record_user_outcome("rotated");
            }
            Ok(UserOutcome::Skipped(_)) => {
                self.skipped += 1;
                record_user_outcome("skipped");
            }
            Err(_) => {
                self.failed += 1;
                record_user_outcome("failed");
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users, {} enqueued, {} rotated, {} skipped, {} failed",
            self.users, self.enqueued, self.rotated, self.skipped, self.failed
        )
    }
}

/// Collaborators shared by every user of one pass.
pub(crate) struct PassContext {
    pub report: CredentialReport,
    pub email_validator: EmailValidator,
    pub executor: RotationExecutor,
    pub notifier: CredentialNotifier,
}

impl PassContext {
    pub async fn prepare(state: &AppState) -> Result<Self, AppError> {
        let report = fetch_credential_report(state.directory.as_ref(), state.settings.report).await?;
        let policy = state.directory.password_policy().await?;

        Ok(Self {
            report,
            email_validator: EmailValidator::new(state.verifier.clone(), state.alerter.clone()),
            executor: RotationExecutor::new(
                state.store.clone(),
                policy,
                state.settings.password_reset_required,
            ),
            notifier: state.notifier(),
        })
    }

    pub fn evaluator(&self) -> ObsolescenceEvaluator<'_> {
        ObsolescenceEvaluator::new(&self.email_validator)
    }
}

/// Re-evaluate `request` against the directory and rotate what is due.
///
/// The email tag in the directory is authoritative; the request's own email
/// is replaced by it.
#[tracing::instrument(skip(state, ctx, request), fields(user = %request.user_name()))]
pub(crate) async fn apply_request(
    state: &AppState,
    ctx: &PassContext,
    request: RefreshCredentialRequest,
    today: NaiveDate,
) -> Result<UserOutcome, UserFailure> {
    let user_name = request.user_name().to_string();

    let tags = load_user_tags(state.directory.as_ref(), &user_name)
        .await
        .at(RotationStage::Discovered)?;
    let Some(email) = tags.email().map(str::to_string) else {
        tracing::info!("No destination email tag, skipping");
        return Ok(UserOutcome::Skipped(SkipReason::NoEmail));
    };
    if request.email().is_some_and(|requested| requested != email) {
        tracing::warn!(requested = ?request.email(), tagged = %email, "Request email differs from tag, using tag");
    }
    let request = request.with_email(Some(&email));

    let mut credentials = load_credentials(state.directory.as_ref(), Some(&ctx.report), &user_name)
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
        tracing::info!("No obsolete credentials");
        return Ok(UserOutcome::Skipped(SkipReason::NotDue));
    }

    let summary = match ctx
        .executor
        .rotate_obsolete(&mut credentials, &request, today)
        .await
    {
        Ok(summary) => summary,
        Err(error) => {
            // Secrets already issued are lost unless they are sent now.
            if credentials.has_rotated() {
                if let Err(e) = ctx.notifier.notify(&state.account, &email, &credentials).await {
                    tracing::error!(error = %e, "Failed to send partially rotated credentials");
                }
            }
            return Err(UserFailure {
                stage: RotationStage::RotationApplied,
                error,
            });
        }
    };

    ctx.notifier
        .notify(&state.account, &email, &credentials)
        .await
        .at(RotationStage::Notified)?;

    tracing::info!(
        login_profile = summary.login_profile_rotated,
        access_keys = summary.access_keys_rotated,
        "Credentials rotated"
    );
    Ok(UserOutcome::Rotated(summary))
}

/// Log and alert a failure that aborted one user.
pub(crate) async fn report_user_failure(state: &AppState, user_name: &str, failure: &UserFailure) {
    tracing::error!(
        user = %user_name,
        stage = %failure.stage,
        error = ?failure.error,
        "Failed to process user"
    );
    state
        .alerter
        .publish(
            &format!(
                "Fail to rotate AWS iam credential {} for user {}, reason : {}",
                state.account, user_name, failure
            ),
            Severity::Error,
        )
        .await;
}

/// Log and alert a failure that aborted a whole command.
pub async fn report_failure(state: &AppState, error: &AppError) {
    tracing::error!(error = ?error, "Rotation command failed");
    state
        .alerter
        .publish(
            &format!(
                "Fail to rotate AWS iam credential {}, reason : {}",
                state.account, error
            ),
            Severity::Error,
        )
        .await;
}

pub(crate) async fn publish_summary(state: &AppState, command: &str, summary: &RunSummary) {
    tracing::info!(command = command, summary = %summary, "Command finished");
    state
        .alerter
        .publish(
            &format!(
                "IAM credential {} for account {} finished: {}",
                command, state.account, summary
            ),
            Severity::Info,
        )
        .await;
}
