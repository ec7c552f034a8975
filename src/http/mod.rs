//! HTTP surface
//!
//! | Method | Path                     | Handler                  |
//! |--------|--------------------------|--------------------------|
//! | GET    | `/health`                | [`handlers::health`]     |
//! | GET    | `/metrics`               | [`handlers::metrics`]    |
//! | POST   | `/api/v1/metrics`        | [`handlers::set_metric`] |
//! | POST   | `/api/v1/metrics/query`  | [`handlers::get_metric`] |
//!
//! `POST /api/v1/metrics` takes an `application/x-ndjson` body and is one
//! ingestion session; the response is sent once the body ends.

pub mod handlers;
pub mod types;

use crate::service::MetricService;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for every handler
pub struct AppState {
    /// Service over the configured store
    pub service: MetricService,
    /// Longest accepted NDJSON line
    pub max_line_bytes: usize,
}

impl AppState {
    /// Create handler state
    pub fn new(service: MetricService, max_line_bytes: usize) -> Self {
        Self {
            service,
            max_line_bytes,
        }
    }
}

/// Build CORS layer from configuration
pub fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    if cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Ingestion sessions
        .route("/api/v1/metrics", post(handlers::set_metric))
        // Aggregation queries
        .route("/api/v1/metrics/query", post(handlers::get_metric))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
}
