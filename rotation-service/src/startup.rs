//! Application startup and lifecycle management.
//!
//! Builds the AWS clients and provider set from [`RotationConfig`] and, in
//! `serve` mode, runs single passes on a fixed interval next to the
//! health/metrics HTTP endpoints.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use chrono::Utc;
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::{MailTransport, RotationConfig};
use crate::handlers::{self, health, HealthState};
use crate::models::AccountInfo;
use crate::services::policy::LimitDefaults;
use crate::services::providers::{
    resolve_account, AlertPublisher, EmailProvider, IamDirectory, IdentityVerifier, RequestQueue,
    SesMailer, SmtpProvider, SnsAlertPublisher, SqsRequestQueue,
};
use crate::services::{Alerter, CredentialNotifier, CredentialStore, Directory, ReportPolling};

/// Settings the handlers need at run time.
#[derive(Debug, Clone)]
pub struct RotationSettings {
    pub limits: LimitDefaults,
    pub password_reset_required: bool,
    pub mail_from: String,
    pub sent_by: Option<String>,
    pub report: ReportPolling,
    pub consume_batch_size: i32,
}

impl RotationSettings {
    pub fn from_config(config: &RotationConfig) -> Self {
        Self {
            limits: config.limits.clone(),
            password_reset_required: config.password_reset_required,
            mail_from: config.mail.from.clone(),
            sent_by: config.mail.sent_by.clone(),
            report: config.report,
            consume_batch_size: config.consume_batch_size,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub account: AccountInfo,
    pub directory: Arc<dyn Directory>,
    pub store: Arc<dyn CredentialStore>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub email_provider: Arc<dyn EmailProvider>,
    pub queue: Option<Arc<dyn RequestQueue>>,
    pub alerter: Alerter,
    pub settings: RotationSettings,
}

impl AppState {
    pub fn notifier(&self) -> CredentialNotifier {
        CredentialNotifier::new(
            self.email_provider.clone(),
            self.settings.mail_from.clone(),
            self.settings.sent_by.clone(),
            self.settings.password_reset_required,
        )
    }

    pub fn queue(&self) -> Result<&Arc<dyn RequestQueue>, AppError> {
        self.queue.as_ref().ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("AWS_SQS_REQUEST_URL is required but not set"))
        })
    }
}

async fn load_sdk_config(config: &RotationConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.aws.region {
        loader = loader.region(Region::new(region.clone()));
    }

    // Custom endpoint, e.g. LocalStack.
    if let Some(endpoint) = &config.aws.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}

/// Application container for managing the service lifecycle.
pub struct Application {
    config: RotationConfig,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: RotationConfig) -> Result<Self, AppError> {
        let sdk_config = load_sdk_config(&config).await;

        let iam = Arc::new(IamDirectory::new(aws_sdk_iam::Client::new(&sdk_config)));
        let ses = Arc::new(SesMailer::new(aws_sdk_ses::Client::new(&sdk_config)));

        let email_provider: Arc<dyn EmailProvider> = match config.mail.transport {
            MailTransport::Ses => {
                tracing::info!("SES email provider initialized");
                ses.clone()
            }
            MailTransport::Smtp => {
                let settings = config.mail.smtp.as_ref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("SMTP settings missing"))
                })?;
                tracing::info!(host = %settings.host, "SMTP email provider initialized");
                Arc::new(SmtpProvider::new(settings)?)
            }
        };

        let alerter = match &config.alert_topic_arn {
            Some(topic_arn) => {
                tracing::info!(topic = %topic_arn, "Alert publishing enabled");
                let publisher: Arc<dyn AlertPublisher> = Arc::new(SnsAlertPublisher::new(
                    aws_sdk_sns::Client::new(&sdk_config),
                    topic_arn.clone(),
                ));
                Alerter::with_publisher(publisher)
            }
            None => {
                tracing::info!("AWS_SNS_RESULT_ARN not set, alerts are only logged");
                Alerter::disabled()
            }
        };

        let queue: Option<Arc<dyn RequestQueue>> = config.request_queue_url.as_ref().map(|url| {
            Arc::new(SqsRequestQueue::new(aws_sdk_sqs::Client::new(&sdk_config), url.clone()))
                as Arc<dyn RequestQueue>
        });

        let sts = aws_sdk_sts::Client::new(&sdk_config);
        let account = resolve_account(&sts, config.account_name.clone())
            .await
            .map_err(|e| {
                tracing::error!("Failed to resolve AWS account: {}", e);
                e
            })?;
        tracing::info!(account = %account, "Rotation service initialized");

        let state = AppState {
            account,
            directory: iam.clone(),
            store: iam,
            verifier: ses,
            email_provider,
            queue,
            alerter,
            settings: RotationSettings::from_config(&config),
        };

        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve health/metrics and run a single pass every schedule interval
    /// until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        let health_state = HealthState::default();
        let router = health::router(health_state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        tracing::info!("Health endpoint listening on port {}", listener.local_addr()?.port());

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });

        let scheduler = run_schedule(
            self.state.clone(),
            self.config.schedule_interval,
            health_state.ready,
        );

        tokio::select! {
            _ = scheduler => {},
            _ = shutdown_signal() => {},
        }

        server.abort();
        tracing::info!("Rotation service stopped");
        Ok(())
    }
}

async fn run_schedule(state: AppState, every: Duration, ready: Arc<AtomicBool>) {
    let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
    loop {
        interval.tick().await;
        let today = Utc::now().date_naive();
        match handlers::run(&state, today).await {
            Ok(summary) => {
                ready.store(true, Ordering::SeqCst);
                tracing::info!(summary = %summary, "Scheduled rotation pass finished");
            }
            Err(e) => {
                handlers::report_failure(&state, &e).await;
            }
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
