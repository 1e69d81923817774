//! Command line entry points.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logger::LogFormat;
use tracing::warn;

use crate::config::Config;
use crate::logs::{FileLogStore, LogStorage};
use crate::orchestrator::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "checkup", author, version, about = "Uptime monitoring worker", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the check and log rotation cycles until Ctrl-C
    Run,

    /// Inspect check logs
    #[command(subcommand)]
    Logs(LogsCommand),

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum LogsCommand {
    /// List active log ids
    List {
        /// Include archive ids
        #[arg(long)]
        archived: bool,
    },

    /// Decompress an archive to stdout
    Show { archive_id: String },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::from_config(self.config.as_ref()).context("Failed to load configuration")?;

        let format = config.logging.format.parse().unwrap_or_else(|error: String| {
            eprintln!("{error}, using compact logs");
            LogFormat::Compact
        });
        logger::init_with(&config.logging.level, format);

        match self.command {
            Command::Run => Orchestrator::start(config).await,
            Command::Logs(command) => run_logs(&config, command).await,
            Command::Config => {
                print!("{config}");
                Ok(())
            }
        }
    }
}

async fn run_logs(config: &Config, command: LogsCommand) -> Result<()> {
    let logs = FileLogStore::open(&config.storage.logs_dir)
        .await
        .with_context(|| format!("Failed to open log directory {}", config.storage.logs_dir.display()))?;

    match command {
        LogsCommand::List { archived } => {
            let ids = logs.list(archived).await?;
            if ids.is_empty() {
                warn!("No logs in {}", config.storage.logs_dir.display());
            }
            for id in ids {
                println!("{id}");
            }
        }
        LogsCommand::Show { archive_id } => {
            let contents = logs
                .decompress(&archive_id)
                .await
                .with_context(|| format!("Failed to read archive {archive_id}"))?;
            print!("{contents}");
        }
    }

    Ok(())
}
