//! Assistant readiness handler
//!
//! The assistant may only start once a credential is configured and every
//! backend is healthy. The credential value is never exposed.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct AssistantResponse {
    pub configured: bool,
    pub ready: bool,
}

/// GET /v1/assistant
pub async fn get_assistant(State(state): State<AppState>) -> Json<AssistantResponse> {
    let configured = state.assistant_configured();
    let ready = configured && state.aggregator().all_healthy().await;
    Json(AssistantResponse { configured, ready })
}
