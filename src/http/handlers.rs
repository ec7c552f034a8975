//! HTTP handlers for the counting API

use super::types::*;
use super::AppState;
use crate::error::QueryError;
use crate::ingestion::ndjson_events;
use crate::metrics::gather_metrics;
use crate::query::AggregationRequest;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store: state.service.store().store_id().to_string(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics() -> impl IntoResponse {
    match gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to gather metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        },
    }
}

/// Ingestion session: one NDJSON event per line, one response at end of body
pub async fn set_metric(State(state): State<Arc<AppState>>, body: Body) -> impl IntoResponse {
    let events = ndjson_events(body.into_data_stream(), state.max_line_bytes);

    match state.service.set_metric(events).await {
        Ok(summary) => {
            info!(events_written = summary.events_written, "Ingestion session completed");
            (StatusCode::OK, Json(SetMetricResponse::ok(&summary)))
        },
        Err(e) => {
            let status = if e.is_stream_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::BAD_GATEWAY
            };
            (status, Json(SetMetricResponse::error(e.to_string())))
        },
    }
}

/// Aggregation query
pub async fn get_metric(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request =
        AggregationRequest::from_wire(req.entity_id, req.from_time, req.to_time, req.interval_count)
            .map_err(query_error)?;

    state
        .service
        .get_metric(&request)
        .await
        .map(Json)
        .map_err(query_error)
}

fn query_error(e: QueryError) -> (StatusCode, Json<ErrorResponse>) {
    let status = if e.is_invalid_request() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}
