use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "rotation-service",
    version,
    about = "Rotates obsolete IAM console passwords and access keys"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Enqueue a refresh request for every user with obsolete credentials
    Scan,
    /// Drain the request queue and rotate what is still due
    Consume,
    /// Process a queue-triggered event payload read from a file
    HandleEvent {
        /// JSON file with a `Records` array
        file: PathBuf,
    },
    /// Enqueue a refresh request for one user
    Request {
        #[arg(long)]
        user: String,
        /// Rotate every credential regardless of age
        #[arg(long)]
        force: bool,
    },
    /// Discover, rotate and notify in a single pass without the queue
    Run,
    /// Run a pass on a fixed interval and serve health/metrics endpoints
    Serve,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Scan => "scan",
            Command::Consume => "consume",
            Command::HandleEvent { .. } => "handle-event",
            Command::Request { .. } => "request",
            Command::Run => "run",
            Command::Serve => "serve",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_command() {
        let cli = Cli::try_parse_from(["rotation-service", "request", "--user", "alice", "--force"])
            .unwrap();
        assert_eq!(
            cli.command,
            Command::Request {
                user: "alice".into(),
                force: true
            }
        );
        assert_eq!(cli.command.name(), "request");
    }

    #[test]
    fn parses_handle_event_path() {
        let cli = Cli::try_parse_from(["rotation-service", "handle-event", "event.json"]).unwrap();
        assert_eq!(
            cli.command,
            Command::HandleEvent {
                file: PathBuf::from("event.json")
            }
        );
    }

    #[test]
    fn request_needs_a_user() {
        assert!(Cli::try_parse_from(["rotation-service", "request"]).is_err());
        assert!(Cli::try_parse_from(["rotation-service"]).is_err());
    }
}
