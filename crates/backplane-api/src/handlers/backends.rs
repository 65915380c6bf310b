//! Backend listing, summary, details and query handlers

use axum::extract::{Path, State};
use axum::Json;
use backplane_core::{BackendKind, CommandOutput, Details, Summary};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendsResponse {
    pub items: Vec<BackendInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    pub kind: BackendKind,
    pub href: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub name: String,
    pub kind: BackendKind,
    pub summary: Summary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetailsResponse {
    pub name: String,
    pub kind: BackendKind,
    pub details: Details,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub command: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub backend: String,
    pub output: CommandOutput,
}

/// GET /v1/backends
pub async fn list_backends(State(state): State<AppState>) -> Json<BackendsResponse> {
    let items = state
        .registry()
        .iter()
        .map(|(name, backend)| BackendInfo {
            name: name.to_string(),
            kind: backend.kind(),
            href: format!("/v1/backends/{}/summary", name),
        })
        .collect();

    Json(BackendsResponse { items })
}

/// GET /v1/backends/{name}/summary
pub async fn get_summary(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let summary = state.aggregator().summarize(&name).await?;
    let kind = state
        .registry()
        .get(&name)
        .map(|backend| backend.kind())
        .ok_or_else(|| ApiError::NotFound(format!("Unknown backend: {}", name)))?;

    Ok(Json(SummaryResponse {
        name,
        kind,
        summary,
    }))
}

/// GET /v1/backends/{name}/details
pub async fn get_details(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DetailsResponse>, ApiError> {
    let details = state.aggregator().details(&name).await?;
    let kind = state
        .registry()
        .get(&name)
        .map(|backend| backend.kind())
        .ok_or_else(|| ApiError::NotFound(format!("Unknown backend: {}", name)))?;

    Ok(Json(DetailsResponse {
        name,
        kind,
        details,
    }))
}

/// POST /v1/backends/{name}/query
pub async fn run_query(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let output = state.gate().execute(&name, &request.command).await?;
    Ok(Json(QueryResponse {
        backend: name,
        output,
    }))
}
