mod activity;
mod bot;
mod config;
mod error;
mod history;
mod jobs;
mod notice;
mod report;
mod scheduler;
mod slack;
mod store;
mod time_utils;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::scheduler::Scheduler;
use crate::time_utils::Zone;

#[derive(Parser)]
#[command(name = "worklog-bot")]
#[command(about = "Daily work-log reports and away reminders for a Slack channel")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Print messages instead of posting them, and skip deletions
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-fetch today's history and remind away or offline members
    Refresh {
        /// Run even outside working hours
        #[arg(long)]
        force: bool,
    },
    /// Post the daily reports (default: yesterday)
    Report {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete stale away/offline notices (default: yesterday)
    Clean {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Cache channel info and the user list in the data directory
    Cache,
    /// Run refresh, report and clean on their cron schedules
    Schedule,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,worklog_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(error::exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Loading configuration from: {}", cli.config.display());
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if cli.dry_run {
        config.bot.dry_run = true;
    }

    info!("Configuration loaded successfully");
    info!("  Channel: {} ({})", config.slack.channel_name, config.slack.channel_id);
    info!("  Members: {}", config.slack.members.len());
    info!("  Data directory: {}", config.bot.data_dir.display());
    info!("  Dry run: {}", config.bot.dry_run);

    match cli.command {
        Commands::Refresh { force } => {
            let mut bot = jobs::slack_bot(&config)?;
            jobs::refresh_today(&mut bot, Zone::now_unix(), force).await?;
        }
        Commands::Report { date } => {
            let mut bot = jobs::slack_bot(&config)?;
            let day = date.unwrap_or_else(|| bot.zone().yesterday());
            jobs::send_reports(&mut bot, day).await?;
        }
        Commands::Clean { date } => {
            let mut bot = jobs::slack_bot(&config)?;
            let day = date.unwrap_or_else(|| bot.zone().yesterday());
            jobs::clean_notices(&mut bot, day).await?;
        }
        Commands::Cache => {
            let mut bot = jobs::slack_bot(&config)?;
            bot.cache_directory().await?;
        }
        Commands::Schedule => {
            let zone = config
                .zone()
                .context("bot.utc_offset_minutes is out of range")?;
            let mut scheduler = Scheduler::new(zone).await?;
            scheduler::tasks::register_bot_jobs(&scheduler, config).await?;
            scheduler.start().await?;

            info!("Bot is running; press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            scheduler.shutdown().await?;
        }
    }

    Ok(())
}
