use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the feed series.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!("feed_fetch_total", "Fetch cycles started.");
        describe_counter!(
            "feed_fetch_errors_total",
            "Fetch cycles that produced no snapshot, by reason."
        );
        describe_counter!("feed_cache_hits_total", "Snapshots served from cache.");
        describe_histogram!("feed_fetch_ms", "Successful fetch cycle duration in milliseconds.");
        describe_gauge!("feed_snapshot_records", "Records in the latest snapshot.");
        describe_gauge!("feed_cache_ttl_secs", "Configured snapshot time-to-live.");

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
