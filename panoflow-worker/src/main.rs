//! # panoflow
//!
//! Auto-converter for stereo fisheye captures dropped onto a shared drive.
//!
//! Any number of workers may run against the same drive. Each poll cycle
//! claims at most one asset through a marker file, stitches it, publishes
//! the panorama next to the raw files and records a terminal marker.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use panoflow_config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use panoflow_core::{CycleOutcome, RemoteStore};
use panoflow_worker::app;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "panoflow")]
#[command(
    about = "Stitch stereo fisheye captures from a shared drive into panoramas"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "PANOFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file to load before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the drive until interrupted (default)
    Run,
    /// Run a single poll cycle and exit
    Once,
    /// Print per-folder job counts without claiming anything
    Status,
    /// Create a job folder under the working folder
    CreateFolder {
        /// Folder name, usually the shoot or location
        name: String,
        /// Parent folder id; defaults to the working folder, then the drive root
        #[arg(long)]
        parent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
                |_| "info,panoflow=info,reqwest=warn,hyper=warn".into(),
            ),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ConfigLoad { config, warnings } = ConfigLoader::with_options(
        ConfigLoaderOptions {
            config_path: cli.config.clone(),
            env_file: cli.env_file.clone(),
        },
    )
    .load()
    .context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("Loaded environment overrides from .env");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "Using configuration file");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Once => once(&config).await,
        Command::Status => status(&config).await,
        Command::CreateFolder { name, parent } => {
            create_folder(&config, &name, parent).await
        }
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let mut worker = app::build_worker(config)?;
    worker.run(shutdown_signal()).await;
    Ok(())
}

async fn once(config: &Config) -> anyhow::Result<()> {
    let mut worker = app::build_worker(config)?;
    let report = worker.run_cycle().await;

    for err in &report.errors {
        error!(stage = %err.stage, "{err}");
    }
    match report.outcome {
        CycleOutcome::Idle => println!("nothing to do"),
        outcome => println!(
            "{outcome:?}: {} in {}",
            report.asset.as_deref().unwrap_or("-"),
            report.folder.as_deref().unwrap_or("-"),
        ),
    }
    if report.errors.iter().any(|err| err.stage.notifies()) {
        anyhow::bail!("cycle finished with {} error(s)", report.errors.len());
    }
    Ok(())
}

async fn status(config: &Config) -> anyhow::Result<()> {
    let worker = app::build_worker(config)?;
    let statuses = worker
        .status()
        .await
        .context("failed to inspect job folders")?;
    if statuses.is_empty() {
        println!("no job folders under the working folder");
    }
    for folder in statuses {
        println!("{folder}");
    }
    Ok(())
}

async fn create_folder(
    config: &Config,
    name: &str,
    parent: Option<String>,
) -> anyhow::Result<()> {
    let http = app::http_client()?;
    let store = app::drive_store(config, &http)?;
    let parent = match parent.or_else(|| config.drive.working_folder_id.clone()) {
        Some(parent) => parent,
        None => store.inner().drive_id().to_string(),
    };
    let id = store
        .create_folder(name, &parent)
        .await
        .with_context(|| format!("failed to create folder '{name}'"))?;
    println!("{id}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
