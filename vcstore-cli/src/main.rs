use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

use commands::{commit, diff, discard, log, serve, show, status, sync};

#[derive(Parser)]
#[command(name = "vcstore")]
#[command(version, about = "Versioned object store on git", long_about = None)]
struct Cli {
    /// Settings file
    #[arg(short, long, global = true, default_value = "vcstore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the store over HTTP
    Serve {
        /// Port for the API server
        #[arg(short, long, default_value = "3030")]
        port: u16,

        /// Seconds between background synchronizations (0 disables)
        #[arg(short, long, default_value = "60")]
        interval: u64,

        /// Do not watch the working directory for outside edits
        #[arg(long)]
        no_watch: bool,
    },

    /// Show current status
    Status,

    /// Clone if needed and synchronize with the remote
    Sync {
        /// Prompt for a credential before connecting
        #[arg(long)]
        ask_credential: bool,
    },

    /// Commit pending changes
    Commit {
        /// Commit message
        message: String,

        /// Objects to commit (all pending changes when omitted)
        ids: Vec<String>,

        /// Stage the objects as removed
        #[arg(long)]
        removing: bool,
    },

    /// Throw away uncommitted changes
    Discard {
        /// Objects to discard (all pending changes when omitted)
        ids: Vec<String>,

        /// Actually discard (without this, just shows preview)
        #[arg(long)]
        execute: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Publish local commits
    Push,

    /// Show commit history
    Log {
        /// Number of commits to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print an object
    Show {
        id: String,

        /// Revision to read from instead of the working copy
        #[arg(short, long)]
        rev: Option<String>,
    },

    /// Show changes of an object, or of all uncommitted objects
    Diff {
        id: Option<String>,

        /// Revision to compare against
        #[arg(short, long, default_value = "HEAD")]
        rev: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cli.config.as_path();

    match cli.command {
        Commands::Serve {
            port,
            interval,
            no_watch,
        } => {
            serve::run(config, port, interval, no_watch).await?;
        }
        Commands::Status => {
            status::run(config).await?;
        }
        Commands::Sync { ask_credential } => {
            sync::run(config, ask_credential).await?;
        }
        Commands::Commit {
            message,
            ids,
            removing,
        } => {
            commit::run(config, message, ids, removing).await?;
        }
        Commands::Discard { ids, execute, yes } => {
            discard::run(config, ids, execute, yes).await?;
        }
        Commands::Push => {
            sync::push(config).await?;
        }
        Commands::Log { limit } => {
            log::run(config, limit).await?;
        }
        Commands::Show { id, rev } => {
            show::run(config, id, rev).await?;
        }
        Commands::Diff { id, rev } => {
            diff::run(config, id, rev).await?;
        }
    }

    Ok(())
}
