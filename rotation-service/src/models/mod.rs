pub mod account;
pub mod credential;
pub mod report;
pub mod request;
pub mod user;

pub use account::AccountInfo;
pub use credential::{AccessKeyInfo, Auditable, CredentialKind, LoginProfileInfo};
pub use report::{CredentialReport, CredentialReportEntry};
pub use request::{
    RefreshCredentialPayload, RefreshCredentialRequest, RefreshCredentialRequestBuilder,
    TimeLimits,
};
pub use user::{
    UserCredentials, UserTags, CLI_TIME_LIMIT_TAG, EMAIL_TAG, LOGIN_PROFILE_TIME_LIMIT_TAG,
};
