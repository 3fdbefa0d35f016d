use secrecy::SecretString;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::policy::LimitDefaults;
use crate::services::report::{
    ReportPolling, DEFAULT_REPORT_MAX_ATTEMPTS, DEFAULT_REPORT_POLL_INTERVAL,
};

const DEFAULT_SCHEDULE_INTERVAL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CONSUME_BATCH_SIZE: i32 = 10;

#[derive(Debug, Clone)]
pub struct RotationConfig {
    pub common: core_config::Config,
    pub aws: AwsSettings,
    pub limits: LimitDefaults,
    pub password_reset_required: bool,
    pub mail: MailSettings,
    pub account_name: Option<String>,
    /// Alerts are only logged when unset.
    pub alert_topic_arn: Option<String>,
    /// Required by the queue commands only.
    pub request_queue_url: Option<String>,
    pub report: ReportPolling,
    pub schedule_interval: Duration,
    pub consume_batch_size: i32,
}

#[derive(Debug, Clone, Default)]
pub struct AwsSettings {
    pub region: Option<String>,
    /// Endpoint override, e.g. LocalStack.
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    Ses,
    Smtp,
}

impl FromStr for MailTransport {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ses" => Ok(MailTransport::Ses),
            "smtp" => Ok(MailTransport::Smtp),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "unknown MAIL_TRANSPORT '{}', expected 'ses' or 'smtp'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub from: String,
    pub sent_by: Option<String>,
    pub transport: MailTransport,
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
}

impl RotationConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_prod();

        let transport: MailTransport = get_env("MAIL_TRANSPORT", Some("ses"), false)?.parse()?;
        let smtp = match transport {
            MailTransport::Ses => None,
            MailTransport::Smtp => Some(SmtpSettings {
                host: get_env("SMTP_HOST", None, is_prod)?,
                port: get_env("SMTP_PORT", Some("587"), is_prod)?
                    .parse()
                    .unwrap_or(587),
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: SecretString::new(get_env("SMTP_PASSWORD", Some(""), is_prod)?),
            }),
        };

        Ok(RotationConfig {
            common,
            aws: AwsSettings {
                region: optional_env("AWS_REGION"),
                endpoint_url: optional_env("AWS_ENDPOINT_URL"),
            },
            limits: LimitDefaults {
                cli: optional_env("AWS_CLI_TIME_LIMIT"),
                login_profile: optional_env("AWS_LOGIN_PROFILE_TIME_LIMIT"),
            },
            password_reset_required: parse_reset_required(
                env::var("AWS_LOGIN_PROFILE_PASSWORD_RESET_REQUIRED").ok().as_deref(),
            ),
            mail: MailSettings {
                from: get_env("AWS_SES_EMAIL_FROM", None, is_prod)?,
                // Older deployments set the misspelled name.
                sent_by: optional_env("CREDENTIALS_SENT_BY")
                    .or_else(|| optional_env("CREDENTIALS_SENDED_BY")),
                transport,
                smtp,
            },
            account_name: optional_env("AWS_ACCOUNT_NAME"),
            alert_topic_arn: optional_env("AWS_SNS_RESULT_ARN"),
            request_queue_url: optional_env("AWS_SQS_REQUEST_URL"),
            report: ReportPolling {
                max_attempts: parse_or("REPORT_MAX_ATTEMPTS", DEFAULT_REPORT_MAX_ATTEMPTS),
                interval: optional_env("REPORT_POLL_INTERVAL_MS")
                    .and_then(|v| v.trim().parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_REPORT_POLL_INTERVAL),
            },
            schedule_interval: Duration::from_secs(parse_or(
                "SCHEDULE_INTERVAL_SECS",
                DEFAULT_SCHEDULE_INTERVAL_SECS,
            )),
            consume_batch_size: parse_or("CONSUME_BATCH_SIZE", DEFAULT_CONSUME_BATCH_SIZE),
        })
    }

    pub fn queue_url(&self) -> Result<&str, AppError> {
        self.request_queue_url.as_deref().ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("AWS_SQS_REQUEST_URL is required but not set"))
        })
    }
}

/// Unset means reset required; otherwise only `true` or `1` enable it.
pub fn parse_reset_required(value: Option<&str>) -> bool {
    match value {
        None | Some("") => true,
        Some(v) => matches!(v.trim().to_lowercase().as_str(), "true" | "1"),
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    optional_env(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "AWS_SES_EMAIL_FROM",
        "AWS_CLI_TIME_LIMIT",
        "AWS_LOGIN_PROFILE_TIME_LIMIT",
        "AWS_LOGIN_PROFILE_PASSWORD_RESET_REQUIRED",
        "AWS_SQS_REQUEST_URL",
        "AWS_SNS_RESULT_ARN",
        "CREDENTIALS_SENT_BY",
        "CREDENTIALS_SENDED_BY",
        "MAIL_TRANSPORT",
        "SMTP_HOST",
        "REPORT_MAX_ATTEMPTS",
        "REPORT_POLL_INTERVAL_MS",
        "APP__ENVIRONMENT",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn reset_required_parsing() {
        assert!(parse_reset_required(None));
        assert!(parse_reset_required(Some("")));
        assert!(parse_reset_required(Some(" TRUE ")));
        assert!(parse_reset_required(Some("1")));
        assert!(!parse_reset_required(Some("false")));
        assert!(!parse_reset_required(Some("yes")));
        assert!(!parse_reset_required(Some("0")));
    }

    #[test]
    fn mail_transport_parsing() {
        assert_eq!("SES".parse::<MailTransport>().unwrap(), MailTransport::Ses);
        assert_eq!(" smtp".parse::<MailTransport>().unwrap(), MailTransport::Smtp);
        assert!(matches!(
            "pigeon".parse::<MailTransport>(),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    #[serial]
    fn loads_defaults() {
        clear_env();
        env::set_var("AWS_SES_EMAIL_FROM", "rotation@example.com");

        let config = RotationConfig::load().expect("config should load");
        assert_eq!(config.mail.from, "rotation@example.com");
        assert_eq!(config.mail.transport, MailTransport::Ses);
        assert!(config.password_reset_required);
        assert_eq!(config.limits, LimitDefaults::default());
        assert_eq!(config.report.max_attempts, 10);
        assert_eq!(config.report.interval, Duration::from_millis(2000));
        assert!(config.alert_topic_arn.is_none());
        assert!(matches!(config.queue_url(), Err(AppError::ConfigError(_))));

        clear_env();
    }

    #[test]
    #[serial]
    fn reads_overrides() {
        clear_env();
        env::set_var("AWS_SES_EMAIL_FROM", "rotation@example.com");
        env::set_var("AWS_CLI_TIME_LIMIT", "30");
        env::set_var("AWS_LOGIN_PROFILE_PASSWORD_RESET_REQUIRED", "false");
        env::set_var("AWS_SQS_REQUEST_URL", "https://sqs.local/queue");
        env::set_var("REPORT_MAX_ATTEMPTS", "3");

        let config = RotationConfig::load().expect("config should load");
        assert_eq!(config.limits.cli.as_deref(), Some("30"));
        assert!(!config.password_reset_required);
        assert_eq!(config.queue_url().unwrap(), "https://sqs.local/queue");
        assert_eq!(config.report.max_attempts, 3);

        clear_env();
    }

    #[test]
    #[serial]
    fn signature_falls_back_to_legacy_name() {
        clear_env();
        env::set_var("AWS_SES_EMAIL_FROM", "rotation@example.com");
        env::set_var("CREDENTIALS_SENDED_BY", "Cloud Team");

        let config = RotationConfig::load().expect("config should load");
        assert_eq!(config.mail.sent_by.as_deref(), Some("Cloud Team"));

        env::set_var("CREDENTIALS_SENT_BY", "Platform");
        let config = RotationConfig::load().expect("config should load");
        assert_eq!(config.mail.sent_by.as_deref(), Some("Platform"));

        clear_env();
    }

    #[test]
    #[serial]
    fn sender_is_required() {
        clear_env();

        let err = RotationConfig::load().unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    #[serial]
    fn production_requires_smtp_host() {
        clear_env();
        env::set_var("APP__ENVIRONMENT", "prod");
        env::set_var("AWS_SES_EMAIL_FROM", "rotation@example.com");
        env::set_var("MAIL_TRANSPORT", "smtp");

        let err = RotationConfig::load().unwrap_err();
        assert!(err.to_string().contains("SMTP_HOST"));

        clear_env();
    }
}
