//! HCP Coordinator: campaign/HCP reservation coordination service.
//!
//! Runs the periodic expiry sweep and, when enabled, the auto-resolver over
//! an in-memory coordination store.

mod demo;

use clap::Parser;
use coordination_core::config::AppConfig;
use coordination_core::types::AutoResolveStrategy;
use coordination_engine::{Coordinator, InMemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hcp-coordinator")]
#[command(about = "Coordinates campaign reservations on healthcare professionals")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "HCP_COORDINATOR__NODE_ID")]
    node_id: Option<String>,

    /// Seconds between expiry sweeps (overrides config)
    #[arg(long, env = "HCP_COORDINATOR__COORDINATION__EXPIRY_SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: Option<u64>,

    /// Run the auto-resolver on a timer
    #[arg(long, default_value_t = false)]
    auto_resolve: bool,

    /// Strategy for the auto-resolver: priority, first_come or budget_efficiency
    #[arg(long)]
    auto_resolve_strategy: Option<AutoResolveStrategy>,

    /// Seed a demo portfolio before starting
    #[arg(long, default_value_t = false)]
    demo: bool,

    /// Run a single sweep, print the outcome as JSON and exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hcp_coordinator=info,coordination_engine=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("HCP Coordinator starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(secs) = cli.sweep_interval_secs {
        config.coordination.expiry_sweep_interval_secs = secs;
    }
    if cli.auto_resolve {
        config.coordination.auto_resolve_enabled = true;
    }
    if let Some(strategy) = cli.auto_resolve_strategy {
        config.coordination.auto_resolve_strategy = strategy;
    }
    let settings = config.coordination.clone();

    info!(
        node_id = %config.node_id,
        sweep_interval_secs = settings.expiry_sweep_interval_secs,
        auto_resolve = settings.auto_resolve_enabled,
        strategy = ?settings.auto_resolve_strategy,
        "Configuration loaded"
    );

    let store = Arc::new(InMemoryStore::new());
    let coordinator = Coordinator::new(store.clone());
    if cli.demo {
        demo::seed(&coordinator)?;
    }

    if cli.once {
        let expired = coordinator.expire_stale_reservations()?;
        let report = if settings.auto_resolve_enabled {
            Some(coordinator.auto_resolve_conflicts(None, settings.auto_resolve_strategy)?)
        } else {
            None
        };
        let outcome = serde_json::json!({
            "node_id": config.node_id,
            "expired": expired,
            "auto_resolve": report,
            "summary": coordinator.campaign_summary()?,
            "store": {
                "reservations": store.reservation_count(),
                "conflict_logs": store.conflict_count(),
            },
        });
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let mut sweep = interval(Duration::from_secs(settings.expiry_sweep_interval_secs.max(1)));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut resolve = interval(Duration::from_secs(settings.auto_resolve_interval_secs.max(1)));
    resolve.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("HCP Coordinator is running");

    loop {
        tokio::select! {
            _ = sweep.tick() => {
                if let Err(e) = coordinator.expire_stale_reservations() {
                    error!(error = %e, "Expiry sweep failed");
                }
            }
            _ = resolve.tick(), if settings.auto_resolve_enabled => {
                match coordinator.auto_resolve_conflicts(None, settings.auto_resolve_strategy) {
                    Ok(report) => info!(
                        total = report.total,
                        resolved = report.resolved,
                        unresolved = report.unresolved,
                        "Auto-resolve pass complete"
                    ),
                    Err(e) => error!(error = %e, "Auto-resolve pass failed"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
