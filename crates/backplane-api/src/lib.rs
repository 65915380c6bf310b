//! backplane-api - REST API over the status aggregator and command gate
//!
//! # Usage
//!
//! ```ignore
//! use backplane_api::{create_router, AppState};
//!
//! let state = AppState::new(aggregator, gate, assistant_key.is_some());
//! let router = create_router(state);
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the REST API router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Status routes
        .route("/v1/status", get(handlers::status::get_status))
        .route("/v1/status/refresh", post(handlers::status::refresh_status))
        .route("/v1/status/count", get(handlers::status::status_count))
        // Backend routes
        .route("/v1/backends", get(handlers::backends::list_backends))
        .route(
            "/v1/backends/{name}/summary",
            get(handlers::backends::get_summary),
        )
        .route(
            "/v1/backends/{name}/details",
            get(handlers::backends::get_details),
        )
        .route(
            "/v1/backends/{name}/query",
            post(handlers::backends::run_query),
        )
        // Assistant
        .route("/v1/assistant", get(handlers::assistant::get_assistant))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
