use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use statsync::config::Config;
use statsync::notifications;
use statsync::storage::{GoogleSheetsClient, Registry, SheetsBackend};
use statsync::summary::SummaryAggregator;
use statsync::sync::{StalenessGate, SyncOrchestrator};

#[derive(Parser)]
#[command(
    name = "statsync",
    version,
    about = "Mirror public profile and publication stats into per-subscriber spreadsheets",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh every due subscriber destination once
    Sync,

    /// Rebuild the summary sheet from every destination
    Summarize,

    /// List registry entries that are due for refresh
    Due,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&format, &config.logging.level, cli.verbose)?;

    tracing::info!("statsync starting");

    match cli.command {
        Commands::Sync => {
            tracing::info!("Starting sync command");
            sync(&config).await?;
        }
        Commands::Summarize => {
            tracing::info!(sheet = %config.sheets.summary_sheet, "Starting summarize command");
            summarize(&config).await?;
        }
        Commands::Due => {
            due(&config).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("statsync=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("statsync={level},warn"))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("statsync=info,warn"))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

/// Backend plus loaded registry, shared by every command
async fn open_registry(config: &Config) -> Result<(Arc<dyn SheetsBackend>, Registry)> {
    config.validate_for_run()?;

    let backend: Arc<dyn SheetsBackend> = Arc::new(
        GoogleSheetsClient::from_config(&config.sheets)
            .context("Failed to create spreadsheet client")?,
    );
    let registry = Registry::load(
        Arc::clone(&backend),
        &config.sheets.registry,
        &config.sheets.registry_sheet,
        config.registry_layout,
    )
    .await
    .context("Failed to load registry")?;

    Ok((backend, registry))
}

async fn sync(config: &Config) -> Result<()> {
    let (backend, mut registry) = open_registry(config).await?;
    let notifier = notifications::from_config(&config.notifications, &config.sync.operator_email);

    let orchestrator = SyncOrchestrator::from_config(config, backend, notifier)
        .context("Failed to create upstream client")?;
    let report = orchestrator.run(&mut registry).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn summarize(config: &Config) -> Result<()> {
    let (backend, registry) = open_registry(config).await?;
    let notifier = notifications::from_config(&config.notifications, &config.sync.operator_email);

    let aggregator = SummaryAggregator::new(
        backend,
        notifier,
        config.summary_cooldown(),
        config.notifications.service_name.clone(),
    );
    let report = aggregator
        .run(&registry, &config.sheets.summary_sheet)
        .await
        .context("Failed to write summary")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn due(config: &Config) -> Result<()> {
    let (_, registry) = open_registry(config).await?;
    let gate = StalenessGate::new(config.staleness_threshold());

    let due: Vec<_> = registry
        .entries()
        .iter()
        .filter(|entry| gate.needs_refresh(entry))
        .collect();

    println!("{} of {} entries due", due.len(), registry.len());
    for entry in due {
        println!(
            "  row {:>4}  {:<24} {:<28} last refreshed: {}",
            entry.row,
            entry.profile_id.text(),
            entry.display_name(),
            entry.last_refreshed.found().unwrap_or("never")
        );
    }
    Ok(())
}
