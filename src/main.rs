//! fare-watch: Binary Entrypoint
//! Loads config, runs startup checks, then loops discovery cycles until Ctrl-C.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fare_watch::api::{self, ApiState};
use fare_watch::metrics::Metrics;
use fare_watch::{build_scheduler, NotifierMux, WatchConfig};

/// Compact logs by default; `FARE_WATCH_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fare_watch=info,warn"));
    let json = std::env::var("FARE_WATCH_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = WatchConfig::load_default().context("loading watch config")?;
    tracing::info!(
        origin = %cfg.origin_code,
        destination = %cfg.destination_code,
        search_days = cfg.search_days,
        trips = %cfg.trip_policy().describe(),
        interval_secs = cfg.check_interval_secs,
        "starting fare watch"
    );

    let scheduler = build_scheduler(&cfg, NotifierMux::from_env())?
        .preflight()
        .await
        .context("startup checks failed")?;

    if let Some(addr) = cfg.metrics_addr.clone() {
        let metrics = Metrics::init()?;
        let app = api::router(ApiState {
            ledger: scheduler.ledger().clone(),
            history: scheduler.history(),
        })
        .merge(metrics.router());
        tokio::spawn(async move {
            if let Err(e) = api::serve(&addr, app).await {
                tracing::error!(error = ?e, "status listener failed");
            }
        });
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested, finishing current cycle");
            let _ = stop_tx.send(true);
        }
    });

    scheduler.run(stop_rx).await;
    Ok(())
}
