//! Quant Alpha Monitor — Binary Entrypoint
//! Boots the Axum HTTP server: config, tracing, metrics, cached feed and routes.

use anyhow::Context;
use quant_alpha_monitor::{app, config::AppConfig, init_tracing, metrics::Metrics};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load_default().context("loading monitor config")?;
    let metrics = Metrics::init()?;

    let router = app(&cfg)?.merge(metrics.router());

    Ok(router.into())
}
