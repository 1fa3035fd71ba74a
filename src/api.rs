use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Local, Utc};
use tower_http::cors::CorsLayer;

use crate::feed::cache::FeedCache;
use crate::feed::types::PaperRecord;
use crate::render::Dashboard;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<FeedCache>,
    pub dashboard: Arc<Dashboard>,
}

impl AppState {
    pub fn new(cache: FeedCache, dashboard: Dashboard) -> Self {
        Self {
            cache: Arc::new(cache),
            dashboard: Arc::new(dashboard),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/papers", get(papers))
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let outcome = state.cache.get_snapshot().await;
    Html(state.dashboard.render(&outcome, Local::now()))
}

#[derive(serde::Serialize)]
struct PapersOut<'a> {
    fetched_at: DateTime<Utc>,
    count: usize,
    papers: &'a [PaperRecord],
}

#[derive(serde::Serialize)]
struct ErrorOut {
    error: String,
    reason: &'static str,
}

async fn papers(State(state): State<AppState>) -> Response {
    match state.cache.get_snapshot().await {
        Ok(snap) => Json(PapersOut {
            fetched_at: snap.fetched_at(),
            count: snap.len(),
            papers: snap.records(),
        })
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorOut {
                error: e.to_string(),
                reason: e.reason(),
            }),
        )
            .into_response(),
    }
}
