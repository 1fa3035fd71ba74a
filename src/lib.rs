// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod feed;
pub mod metrics;
pub mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::feed::{FeedCache, FeedError, FeedSnapshot, PaperRecord};
pub use crate::render::Dashboard;

/// Build the dashboard router against the real arXiv endpoint from `cfg`.
pub fn app(cfg: &AppConfig) -> Result<Router> {
    let source = feed::HttpFeedSource::from_config(&cfg.feed).context("building http client")?;
    info!(
        endpoint = source.endpoint(),
        query = %cfg.feed.search_query,
        ttl_secs = cfg.feed.cache_ttl_secs,
        "feed source configured"
    );
    let cache = FeedCache::new(Arc::new(source), cfg.feed.cache_ttl());
    let state = AppState::new(cache, Dashboard::from_config(cfg));
    Ok(router(state))
}

/// Install a fmt subscriber filtered by `RUST_LOG`.
/// `MONITOR_LOG_JSON=1` switches to JSON lines. A subscriber that is already
/// installed (e.g. by the hosting runtime) is left alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quant_alpha_monitor=info,feed=info,warn"));

    let json = std::env::var("MONITOR_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
