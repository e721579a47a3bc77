use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "fare_lookups_total",
            "Quote lookups by source and outcome (found/absent/blocked/rate_limited)."
        );
        describe_histogram!("fare_lookup_ms", "Quote lookup latency in milliseconds.");
        describe_counter!("fare_cycles_total", "Discovery cycles completed.");
        describe_counter!("fare_new_records_total", "Cycles that committed a new record low.");
        describe_counter!("fare_notify_errors_total", "Failed record notifications per sink.");
        describe_gauge!("fare_cycle_best_price_usd", "Cheapest price seen in the last cycle.");
        describe_gauge!("fare_record_price_usd", "Current all-time best price.");
        describe_gauge!("fare_last_cycle_ts", "Unix ts when the last cycle finished.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already set.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
