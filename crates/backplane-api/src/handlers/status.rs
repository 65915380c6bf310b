//! Backend status handlers

use axum::extract::{Query, State};
use axum::Json;
use backplane_core::StatusSnapshot;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// Bypass the cache and probe every backend
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusCountResponse {
    pub connected: usize,
    pub total: usize,
    pub all_healthy: bool,
}

/// GET /v1/status
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusSnapshot> {
    Json(state.aggregator().get_snapshot(query.refresh).await)
}

/// POST /v1/status/refresh
pub async fn refresh_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.aggregator().refresh().await)
}

/// GET /v1/status/count
pub async fn status_count(State(state): State<AppState>) -> Json<StatusCountResponse> {
    let snapshot = state.aggregator().get_snapshot(false).await;
    Json(StatusCountResponse {
        connected: snapshot.connected_count(),
        total: snapshot.len(),
        all_healthy: snapshot.all_healthy(),
    })
}
