mod backend;
mod collector;
mod config;
mod error;
mod http;
mod kafka;
mod metrics;
mod pipeline;
mod reconcile;

use crate::config::Config;
use crate::http::server::HealthServer;
use crate::pipeline::{LagPipeline, PipelineStatus, Scheduler};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "consumerlag-exporter")]
#[command(about = "Publishes Kafka consumer group lag as custom metrics to a monitoring backend")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "consumerlag.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll consumer groups and publish their lag (default)
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Create or overwrite the lag thresholds of the named groups
    CreateThresholds {
        #[arg(required = true)]
        groups: Vec<String>,
    },
    /// Delete the lag metric definition of a group
    DeleteMetric { group: String },
    /// Register the custom device that lag metrics are published to
    DefineDevice,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    let level = if config.exporter.debug && args.log_level == "info" {
        "debug"
    } else {
        args.log_level.as_str()
    };
    init_logging(level);

    info!(
        config = %args.config.display(),
        poll_interval = ?config.exporter.poll_interval,
        development = config.exporter.development,
        kafka_only = config.exporter.kafka_only,
        "Configuration loaded"
    );

    let pipeline = LagPipeline::from_config(&config, &args.config)?;

    match args.command.unwrap_or(Command::Run { once: false }) {
        Command::Run { once } => run(config, pipeline, once).await,
        Command::CreateThresholds { groups } => {
            let failures = pipeline.create_thresholds(&groups).await?;
            if failures > 0 {
                anyhow::bail!("{failures} of {} thresholds could not be written", groups.len());
            }
            info!(groups = groups.len(), "Thresholds written");
            Ok(())
        }
        Command::DeleteMetric { group } => {
            if !pipeline.delete_metric(&group).await? {
                anyhow::bail!("metric for consumer group '{group}' could not be deleted");
            }
            Ok(())
        }
        Command::DefineDevice => {
            if !pipeline.define_device().await? {
                anyhow::bail!(
                    "custom device '{}' could not be defined",
                    config.backend.custom_device
                );
            }
            Ok(())
        }
    }
}

async fn run(config: Config, pipeline: LagPipeline, once: bool) -> anyhow::Result<()> {
    info!("Starting consumerlag-exporter");

    let status = Arc::new(PipelineStatus::new());
    let mut scheduler = Scheduler::new(pipeline, Arc::clone(&status), &config.exporter);

    if once || config.exporter.development {
        let report = scheduler.run_once().await?;
        info!(
            cycle = report.cycle,
            groups = report.groups_selected,
            series = report.series,
            "Single cycle finished"
        );
        return Ok(());
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let server_handle = if config.exporter.health.enabled {
        let server = HealthServer::new(
            &config.exporter.health.host,
            config.exporter.health.port,
            Arc::clone(&status),
        )?;
        let shutdown_rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(shutdown_rx).await {
                error!(error = %e, "Health server error");
            }
        }))
    } else {
        None
    };

    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    shutdown_signal().await?;
    info!("Shutdown signal received, stopping...");

    let _ = shutdown_tx.send(());

    if let Some(handle) = server_handle {
        let _ = handle.await;
    }

    // A cycle in flight may be waiting on a command or request timeout.
    match tokio::time::timeout(std::time::Duration::from_secs(10), scheduler_handle).await {
        Ok(_) => info!("Collection loop stopped"),
        Err(_) => warn!("Timeout waiting for the collection loop to stop"),
    }

    info!("consumerlag-exporter stopped");
    Ok(())
}

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}
