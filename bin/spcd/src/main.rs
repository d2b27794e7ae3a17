//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "binary"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Binary entrypoint for the SPC space controller daemon."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spc_activity::ActivityRegistry;
use spc_common::{init_tracing, AppConfig};
use spc_core::SpaceControllerRuntime;
use tokio::signal;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "SPC space controller daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the space controller until interrupted")]
    Run,
    #[command(about = "Print the controller identity and installed activities")]
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/spcd.toml"));
    candidates.push(PathBuf::from("configs/example.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            init_tracing("spcd", &config.logging)?;
            info!(config_path = %loaded.source.display(), "configuration loaded");
            run_controller(config).await?
        }
        Commands::Status => print_status(&config, &loaded.source)?,
    }

    Ok(())
}

async fn run_controller(config: AppConfig) -> Result<()> {
    let handle = SpaceControllerRuntime::new(config)
        .start()
        .await
        .context("failed to start space controller")?;

    info!(uuid = %handle.identity().uuid(), "controller running; waiting for termination signal");
    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            info!("ctrl-c received; shutting down");
        }
        _ = handle.shutdown_requested() => {
            info!("shutdown requested by master; shutting down");
        }
    }
    handle.shutdown().await?;
    Ok(())
}

fn print_status(config: &AppConfig, source: &std::path::Path) -> Result<()> {
    let registry = ActivityRegistry::new();
    registry.load_from_dir(&config.storage.activities_dir());
    let summary = serde_json::json!({
        "config": source.display().to_string(),
        "controller": {
            "uuid": config.controller.uuid,
            "name": config.controller.name,
            "host_id": config.controller.host_id,
        },
        "storage_root": config.storage.root.display().to_string(),
        "installed": registry.all_installed(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
