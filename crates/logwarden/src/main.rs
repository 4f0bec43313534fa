//! Logwarden ingestion daemon
//!
//! Polls every configured game server on a fixed interval and forwards new
//! log events.
//!
//! Usage:
//!     logwarden --config /etc/logwarden/config.toml
//!     logwarden --config config.toml --once --verbose
//!     logwarden --config config.toml --once --json

use anyhow::{Context, Result};
use clap::Parser;
use logwarden_db::{CheckpointDb, CheckpointStore};
use logwarden_ingest::{
    ConnectionPool, ContentFetcher, Coordinator, EventRouter, IngestConfig, IngestState,
    PassSummary, RetryPolicy, SshConnector, TenantOutcome, TracingPresence, TracingSink,
};
use logwarden_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "logwarden", version, about = "Incremental game-server log ingestion")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, short, env = "LOGWARDEN_CONFIG")]
    config: PathBuf,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Debug-level console output
    #[arg(long, short)]
    verbose: bool,

    /// Seconds between passes (overrides poll_interval_secs)
    #[arg(long)]
    interval: Option<u64>,

    /// With --once, print the pass summary as JSON on stdout
    #[arg(long, requires = "once")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = init_logging(LogConfig {
        app_name: "logwarden",
        verbose: args.verbose,
        log_dir: None,
    })?;

    let mut config = IngestConfig::load(&args.config)
        .with_context(|| format!("Failed to load config: {}", args.config.display()))?;
    if let Some(secs) = args.interval {
        config.poll_interval_secs = secs;
    }

    info!("Starting Logwarden");
    info!("  Config: {}", args.config.display());
    info!("  Database: {}", config.database_path);
    info!("  Tenants: {}", config.tenants().len());

    let db = CheckpointDb::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open checkpoint database: {}", config.database_path))?;
    match db.list().await {
        Ok(checkpoints) => {
            for (tenant, record) in &checkpoints {
                debug!(%tenant, lines = record.line_count, source = ?record.source, "Checkpoint");
            }
            info!("  Checkpoints: {}", checkpoints.len());
        }
        Err(e) => warn!(error = %e, "Failed to list checkpoints"),
    }

    let connector = Arc::new(SshConnector::new(config.ssh.clone()));
    let pool = ConnectionPool::new(connector, RetryPolicy::from_config(&config.ssh));
    let fetcher = ContentFetcher::new(pool, &config);
    let router = EventRouter::new(Arc::new(TracingSink));
    let mut coordinator = Coordinator::new(
        fetcher,
        Arc::new(db.clone()),
        router,
        Arc::new(TracingPresence),
    );
    let mut state = IngestState::new();

    if args.once {
        let summary = coordinator.run_pass(&mut state, &config).await;
        report(&summary);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    } else {
        let mut ticker = tokio::time::interval(config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("  Interval: {}s", config.poll_interval().as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = coordinator.run_pass(&mut state, &config).await;
                    report(&summary);
                    let status = coordinator.status(&state);
                    info!(
                        active_sessions = status.active_sessions,
                        tracked_tenants = status.tracked_tenants,
                        pooled_connections = status.pooled_connections,
                        "Status"
                    );
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!(error = %e, "Failed to listen for shutdown signal");
                    }
                    info!("Shutdown requested");
                    break;
                }
            }
        }
    }

    coordinator.shutdown().await;
    db.close().await;
    Ok(())
}

fn report(summary: &PassSummary) {
    for (tenant, outcome) in &summary.outcomes {
        match outcome {
            TenantOutcome::Skipped { reason } => warn!(%tenant, %reason, "Skipped"),
            TenantOutcome::ColdStart {
                lines, suppressed, ..
            } => info!(%tenant, lines, suppressed, "Cold start"),
            TenantOutcome::NoNewLines => info!(%tenant, "No new lines"),
            TenantOutcome::Processed {
                lines,
                events,
                delivered,
                breaker_tripped,
            } => info!(%tenant, lines, events, delivered, breaker_tripped, "Processed"),
        }
    }
}
