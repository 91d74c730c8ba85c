//! Geofence service - zone entry/exit detection for vehicle fleets
//!
//! Accepts vehicle location events over HTTP, evaluates them against a set
//! of geographic zones loaded at startup, and reports enter/exit transitions.
//!
//! Module structure:
//! - `domain/` - Core business types (events, zones, transitions)
//! - `io/` - External interfaces (HTTP API, zone file)
//! - `services/` - Business logic (geometry, registry, store, engine)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use geofence_service::infra::{Config, Metrics};
use geofence_service::io::{load_zones, start_http_server};
use geofence_service::services::{TransitionEngine, VehicleStore, ZoneRegistry};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Geofence service - vehicle zone transition detection
#[derive(Parser, Debug)]
#[command(name = "geofence-service", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to the CONFIG_FILE
    /// environment variable, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("geofence-service starting");

    let args = Args::parse();
    let config_path = Config::resolve_config_path(args.config.as_deref());
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        bind_address = %config.bind_address(),
        http_port = %config.http_port(),
        zones_file = %config.zones_file(),
        debounce_ms = %config.debounce_ms(),
        max_future_skew_secs = %config.max_future_skew_secs(),
        site = %config.site_id(),
        "config_loaded"
    );

    // Zone loading is fatal on any invalid definition: the service refuses
    // to start rather than serve with a partial registry
    let zones = load_zones(Path::new(config.zones_file()))?;
    let registry = Arc::new(ZoneRegistry::new(zones)?);
    info!(zones = %registry.len(), "zone_registry_loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());
    let zone_ids: Vec<_> = registry.all().iter().map(|z| z.id.clone()).collect();
    metrics.set_zones(&zone_ids);

    let store = Arc::new(VehicleStore::new());
    let engine =
        Arc::new(TransitionEngine::new(&config, registry.clone(), store, metrics.clone()));

    // Start metrics reporter (lock-free reads with full summary)
    let reporter_metrics = metrics.clone();
    let reporter_engine = engine.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            let summary = reporter_metrics.report(reporter_engine.active_vehicles());
            summary.log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run HTTP server - serves until shutdown is signalled
    start_http_server(
        config.bind_address(),
        config.http_port(),
        engine,
        registry,
        metrics,
        config.site_id().to_string(),
        shutdown_rx,
    )
    .await?;

    info!("geofence-service shutdown complete");
    Ok(())
}
