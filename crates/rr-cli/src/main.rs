//! remote-run CLI
//!
//! Runs commands and copies files on one remote host over SSH:
//! - `run` / `stream` / `script` execute remote commands
//! - `copy` / `copy-many` / `safe-copy` transfer files and directories
//! - `config` manages the configuration file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remote_run::commands;
use remote_run::output::print_error;
use remote_run::settings::{self, ConnectionArgs};
use rr_core::config::ConfigFile;
use rr_core::Connector;
use rr_exec::Runner;
use rr_ssh::SshConnector;
use rr_transfer::{TransferClient, TransferOrchestrator};

#[derive(Parser)]
#[command(name = "remote-run")]
#[command(author, version, about = "Run commands and copy files on remote hosts over SSH")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a remote command and print its output when it finishes
    Run {
        /// Seconds before giving up (0 or less: no limit)
        #[arg(short, long)]
        timeout: Option<i64>,
        /// Command line to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run a remote command and print each line as it arrives
    Stream {
        /// Seconds before giving up (0 or less: no limit)
        #[arg(short, long)]
        timeout: Option<i64>,
        /// Command line to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run a local script file through the remote shell
    Script {
        /// Script file to run
        #[arg(required_unless_present = "eval")]
        file: Option<PathBuf>,
        /// Run this script text instead of a file
        #[arg(short, long, conflicts_with = "file")]
        eval: Option<String>,
        /// Seconds before giving up (0 or less: no limit)
        #[arg(short, long)]
        timeout: Option<i64>,
    },

    /// Copy a local file or directory to the remote host
    ///
    /// A file is written to REMOTE; a directory is copied into the remote
    /// directory REMOTE.
    Copy {
        local: PathBuf,
        remote: String,
        /// Seconds allowed for remote extraction (0 or less: no limit)
        #[arg(short, long)]
        timeout: Option<i64>,
    },

    /// Copy several LOCAL=REMOTE pairs concurrently
    CopyMany {
        /// Pairs of LOCAL=REMOTE
        #[arg(required = true)]
        pairs: Vec<String>,
        /// Seconds allowed for the whole batch (0 or less: no limit)
        #[arg(short, long)]
        timeout: Option<i64>,
    },

    /// Upload a file to a staging path, then move it into place
    SafeCopy { local: PathBuf, remote: String },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.command {
        Commands::Config { .. } => None,
        _ => match settings::load(cli.config.as_deref(), &cli.connection) {
            Ok(file) => Some(file),
            Err(e) => {
                print_error(&format!("{:#}", e));
                std::process::exit(1);
            }
        },
    };

    // Setup logging based on verbosity
    let remote_output = loaded.as_ref().is_some_and(|file| file.run.verbose);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| settings::log_filter(cli.quiet, cli.verbose, remote_output)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = dispatch(cli, loaded).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn dispatch(cli: Cli, loaded: Option<ConfigFile>) -> Result<()> {
    let config_path = cli.config.as_deref();

    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => commands::config_show(config_path),
            ConfigAction::Path => {
                commands::config_path_command(config_path);
                Ok(())
            }
            ConfigAction::Init { force } => commands::config_init(config_path, *force),
        };
    }

    let file = match loaded {
        Some(file) => file,
        None => settings::load(config_path, &cli.connection)?,
    };
    let verbose = file.run.verbose || cli.verbose > 0;
    let connector = connect(&file)?;

    match cli.command {
        Commands::Run { timeout, command } => {
            let timeout = timeout.unwrap_or(file.run.command_timeout_secs);
            commands::run_command(&Runner::new(connector), &command.join(" "), timeout).await
        }
        Commands::Stream { timeout, command } => {
            let timeout = timeout.unwrap_or(file.run.command_timeout_secs);
            commands::stream_command(&Runner::new(connector), &command.join(" "), timeout).await
        }
        Commands::Script {
            file: script,
            eval,
            timeout,
        } => {
            let timeout = timeout.unwrap_or(file.run.command_timeout_secs);
            let runner = Runner::new(connector);
            match (script, eval) {
                (_, Some(text)) => commands::inline_script_command(&runner, &text, timeout).await,
                (Some(path), None) => commands::script_command(&runner, &path, timeout).await,
                (None, None) => anyhow::bail!("Provide a script file or --eval"),
            }
        }
        Commands::Copy {
            local,
            remote,
            timeout,
        } => {
            let timeout = timeout.unwrap_or(file.run.transfer_timeout_secs);
            let client = TransferClient::new(connector);
            commands::copy_command(&client, &local, &remote, timeout, verbose).await
        }
        Commands::CopyMany { pairs, timeout } => {
            let timeout = timeout.unwrap_or(file.run.transfer_timeout_secs);
            let orchestrator = TransferOrchestrator::new(connector);
            commands::copy_many_command(&orchestrator, &pairs, timeout, verbose).await
        }
        Commands::SafeCopy { local, remote } => {
            let client = TransferClient::new(connector);
            commands::safe_copy_command(&client, &local, &remote).await
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn connect(file: &ConfigFile) -> Result<Arc<dyn Connector>> {
    let connector = SshConnector::new(file.ssh.clone())
        .with_context(|| format!("Invalid connection settings for {}", file.ssh.target()))?;
    tracing::debug!("Using {}", connector.target());
    Ok(Arc::new(connector))
}
