//! FlowSync CLI - Command-line interface for FlowSync
//!
//! Provides commands for:
//! - Registering remote connections
//! - Pulling, pushing and syncing workflows
//! - Viewing sync status and history
//! - Inspecting and resolving conflicts

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flowsync_core::config::Config;

mod commands;
mod output;

use commands::{
    conflicts::ConflictsCommand,
    connection::ConnectionCommand,
    diff::DiffCommand,
    history::HistoryCommand,
    stage::StageCommand,
    status::StatusCommand,
    sync::{PullCommand, PushCommand, SyncCommand},
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "flowsync", version, about = "Two-way sync for remote workflow definitions")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage remote connections
    #[command(subcommand)]
    Connection(ConnectionCommand),
    /// Bring remote changes into the local store
    Pull(PullCommand),
    /// Send local changes to the remote
    Push(PushCommand),
    /// Pull, then push
    Sync(SyncCommand),
    /// Show per-workflow sync status
    Status(StatusCommand),
    /// List and resolve conflicts
    #[command(subcommand)]
    Conflicts(ConflictsCommand),
    /// Compare a local workflow with its remote
    Diff(DiffCommand),
    /// Stage a new workflow from a JSON file
    Stage(StageCommand),
    /// Show the sync history of a connection
    History(HistoryCommand),
}

fn init_tracing(verbose: u8, config: &Config) {
    let level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `--json` output on stdout stays parseable
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("{}: {}", problem.field, problem.message);
        }
        bail!("Invalid configuration ({} problems)", problems.len());
    }

    init_tracing(cli.verbose, &config);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Connection(cmd) => cmd.execute(&config, format).await,
        Commands::Pull(cmd) => cmd.execute(&config, format).await,
        Commands::Push(cmd) => cmd.execute(&config, format).await,
        Commands::Sync(cmd) => cmd.execute(&config, format).await,
        Commands::Status(cmd) => cmd.execute(&config, format).await,
        Commands::Conflicts(cmd) => cmd.execute(&config, format).await,
        Commands::Diff(cmd) => cmd.execute(&config, format).await,
        Commands::Stage(cmd) => cmd.execute(&config, format).await,
        Commands::History(cmd) => cmd.execute(&config, format).await,
    }
}
