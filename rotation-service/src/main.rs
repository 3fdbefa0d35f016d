use chrono::Utc;
use clap::Parser;
use rotation_service::cli::{Cli, Command};
use rotation_service::config::RotationConfig;
use rotation_service::handlers::{self, RunSummary, SqsEvent};
use rotation_service::services::init_metrics;
use rotation_service::startup::Application;
use service_core::error::AppError;
use service_core::observability::init_tracing;
use std::process::ExitCode;
use tracing::Instrument;
use uuid::Uuid;

fn print_summary(summary: &RunSummary) -> Result<(), AppError> {
    println!("{}", serde_json::to_string(summary)?);
    Ok(())
}

async fn execute(command: Command, config: RotationConfig) -> Result<(), AppError> {
    let app = Application::build(config).await?;
    if command == Command::Serve {
        return app.run_until_stopped().await;
    }

    let state = app.state().clone();
    let today = Utc::now().date_naive();

    let result = match command {
        Command::Scan => handlers::scan(&state, today).await,
        Command::Consume => handlers::consume(&state, today).await,
        Command::Run => handlers::run(&state, today).await,
        Command::HandleEvent { file } => {
            let payload = tokio::fs::read_to_string(&file).await?;
            let event = SqsEvent::from_json(&payload)?;
            handlers::handle_event(&state, &event, today).await
        }
        Command::Request { user, force } => {
            match handlers::enqueue_request(&state, &user, force).await {
                Ok(request) => {
                    println!("{}", request.to_json()?);
                    return Ok(());
                }
                Err(e) => Err(e),
            }
        }
        Command::Serve => return Ok(()),
    };

    match result {
        Ok(summary) => print_summary(&summary),
        Err(e) => {
            handlers::report_failure(&state, &e).await;
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match RotationConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(
        "rotation-service",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    ) {
        eprintln!("Failed to initialize tracing: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = init_metrics() {
        tracing::warn!("Metrics disabled: {}", e);
    }

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("rotation", run_id = %run_id, command = cli.command.name());

    match execute(cli.command, config).instrument(span).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(run_id = %run_id, error = ?e, "Rotation service failed");
            ExitCode::FAILURE
        }
    }
}
