//! trackbridge: keep a Linear project and its Jira issues in step.
//!
//! # Usage
//!
//! ```text
//! trackbridge init [--force]
//! trackbridge sync [--dry-run] [--project <id>] [--status-mode <mode>] [--json]
//! trackbridge mappings list [--json]
//! trackbridge mappings show <KEY|LINEAR_ID>
//! trackbridge mappings link <KEY> <LINEAR_ID>
//! trackbridge mappings unlink <KEY|LINEAR_ID>
//! trackbridge daemon start|stop|status|trigger
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, init::InitArgs, mappings::MappingsCommand, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "trackbridge",
    version,
    about = "Reconcile Linear issues with their Jira counterparts",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a commented default config.yaml.
    Init(InitArgs),

    /// Run one reconciliation pass over the configured Linear project.
    Sync(SyncArgs),

    /// Inspect and pin Jira <-> Linear issue links.
    Mappings {
        #[command(subcommand)]
        command: MappingsCommand,
    },

    /// Run or talk to the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

pub(crate) fn home_dir() -> Result<PathBuf> {
    Ok(trackbridge_core::config::home()?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Mappings { command } => commands::mappings::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
