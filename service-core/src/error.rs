use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unverified email: {0}")]
    UnverifiedEmail(String),

    #[error("Dependency not ready: {0}")]
    TransientDependency(String),

    #[error("AWS error: {0}")]
    Aws(anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the failure is worth polling again.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::TransientDependency(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("malformed payload: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::EmailError(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::EmailError(format!("invalid address: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_dependency_errors_are_transient() {
        assert!(AppError::TransientDependency("report".into()).is_transient());
        assert!(!AppError::ValidationError("user_name".into()).is_transient());
        assert!(!AppError::Aws(anyhow::anyhow!("throttled")).is_transient());
    }

    #[test]
    fn json_errors_become_validation_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::ValidationError(_)));
        assert!(app_err.to_string().starts_with("Validation error: malformed payload"));
    }
}
