pub mod alerts;
pub mod directory;
pub mod email_validation;
pub mod executor;
pub mod metrics;
pub mod notification;
pub mod obsolescence;
pub mod password;
pub mod policy;
pub mod providers;
pub mod report;

pub use alerts::{format_alert, Alerter, Severity};
pub use directory::{CredentialStore, Directory};
pub use email_validation::EmailValidator;
pub use executor::{RotationExecutor, RotationSummary};
pub use metrics::{get_metrics, init_metrics};
pub use notification::CredentialNotifier;
pub use obsolescence::{is_obsolete, ObsolescenceEvaluator};
pub use policy::{resolve_time_limits, LimitDefaults};
pub use providers::{
    AlertPublisher, EmailProvider, IdentityVerifier, IamDirectory, RequestQueue, SesMailer,
    SmtpProvider, SnsAlertPublisher, SqsRequestQueue,
};
pub use report::{fetch_credential_report, ReportPolling};
