//! mergeclock CLI

mod cli;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mergeclock::types::RepoId;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mergeclock")]
#[command(about = "Deadline-driven auto-merge bot for GitHub pull requests")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/mergeclock/config.toml)
    #[arg(long, global = true, env = "MERGECLOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging for mergeclock
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server and the periodic sweep
    Serve {
        /// Listen address, overriding the config file
        #[arg(long)]
        bind: Option<String>,

        /// Do not run the periodic sweep
        #[arg(long)]
        no_sweep: bool,
    },

    /// Run a single sweep pass and exit
    Sweep,

    /// Show the computed merge schedule of a pull request without writing anything
    Deadline {
        /// Repository in owner/name form
        repo: RepoId,

        /// Pull request number
        number: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    mergeclock::logging::init(cli.verbose).context("failed to initialize logging")?;

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve { bind, no_sweep } => {
            cli::run_serve(config, cli::ServeOptions { bind, no_sweep }).await?;
        }
        Commands::Sweep => {
            cli::run_sweep(config).await?;
        }
        Commands::Deadline { repo, number } => {
            cli::run_deadline(config, repo, number).await?;
        }
    }

    Ok(())
}
