// src/api.rs
//! Read-only status surface: liveness, the stored record, recent cycles.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::history::{CycleEntry, CycleHistory};
use crate::ledger::{BestPriceLedger, LedgerState};

const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Clone)]
pub struct ApiState {
    pub ledger: BestPriceLedger,
    pub history: Arc<CycleHistory>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/best", get(best))
        .route("/history", get(history))
        .with_state(state)
}

/// Bind `addr` and serve `app` until the process exits.
pub async fn serve(addr: &str, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding status listener on {addr}"))?;
    tracing::info!(%addr, "status listener up");
    axum::serve(listener, app)
        .await
        .context("status listener stopped")
}

async fn best(State(state): State<ApiState>) -> Response {
    match state.ledger.load().await {
        LedgerState::Recorded(r) => Json(r).into_response(),
        LedgerState::NoRecord => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "record": null })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn history(
    State(state): State<ApiState>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<CycleEntry>> {
    let n = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.history.snapshot_last_n(n))
}
