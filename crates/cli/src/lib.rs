pub mod commands;

use std::io;
use std::process::ExitCode;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use incidentfox_core::config::{LoadOptions, LogFormat, RuntimeConfig};
use tracing::Level;

use crate::commands::credentials::CredentialAction;

#[derive(Debug, Parser)]
#[command(
    name = "incidentfox",
    about = "IncidentFox operator CLI",
    long_about = "Manage local integration credentials, look up vault secrets, and inspect which integrations this host can serve.",
    after_help = "Examples:\n  incidentfox credentials set GITHUB_TOKEN ghp_xxx\n  incidentfox status --json\n  incidentfox envelope slack send_message"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Read and write the local credential file")]
    Credentials {
        #[command(subcommand)]
        action: CredentialsCommand,
    },
    #[command(about = "Resolve secrets through the configured vault backend")]
    Vault {
        #[command(subcommand)]
        action: VaultCommand,
    },
    #[command(about = "Report which integrations are configured outside a request context")]
    Status {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the config_required envelope a tool would return")]
    Envelope {
        integration: String,
        tool: String,
        #[arg(long = "missing", value_name = "FIELD", help = "Missing field to list (repeatable)")]
        missing: Vec<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
}

#[derive(Debug, Subcommand)]
enum CredentialsCommand {
    #[command(about = "Save KEY=VALUE to the credential file")]
    Set { key: String, value: String },
    #[command(about = "Show a credential, environment first")]
    Get {
        key: String,
        #[arg(long, help = "Print the value instead of a redacted form")]
        reveal: bool,
    },
    #[command(about = "Remove a key from the credential file")]
    Delete { key: String },
    #[command(about = "List saved keys")]
    List,
}

#[derive(Debug, Subcommand)]
enum VaultCommand {
    #[command(about = "Look up a vault:// path")]
    Get {
        path: String,
        #[arg(long, help = "Print the secret instead of a redacted form")]
        reveal: bool,
    },
}

impl From<CredentialsCommand> for CredentialAction {
    fn from(command: CredentialsCommand) -> Self {
        match command {
            CredentialsCommand::Set { key, value } => Self::Set { key, value },
            CredentialsCommand::Get { key, reveal } => Self::Get { key, reveal },
            CredentialsCommand::Delete { key } => Self::Delete { key },
            CredentialsCommand::List => Self::List,
        }
    }
}

/// Logs go to stderr so stdout stays parseable.
fn init_logging(config: &RuntimeConfig) -> anyhow::Result<()> {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow!("could not install log subscriber: {error}"))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // A broken config still reaches the command, which reports it as `config_validation`.
    let logging_config = RuntimeConfig::load(LoadOptions::default()).unwrap_or_default();
    if let Err(error) = init_logging(&logging_config) {
        eprintln!("{error:#}");
    }

    let result = match cli.command {
        Command::Credentials { action } => commands::credentials::run(action.into()),
        Command::Vault { action: VaultCommand::Get { path, reveal } } => {
            commands::vault::run(&path, reveal)
        }
        Command::Status { json } => commands::status::run(json),
        Command::Envelope { integration, tool, missing } => {
            commands::envelope::run(&integration, &tool, missing)
        }
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
