//! Request and response bodies for the HTTP API

use crate::ingestion::{SessionStatus, SessionSummary};
use crate::types::WireTimestamp;
use serde::{Deserialize, Serialize};

pub use crate::query::QueryResponse;

// =============================================================================
// Write API Types
// =============================================================================

/// Response sent once at the end of an ingestion session
#[derive(Debug, Serialize, Deserialize)]
pub struct SetMetricResponse {
    /// `OK` or `ERROR`
    pub status: SessionStatus,
    /// Records persisted by a completed session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_written: Option<u64>,
    /// Failure description when `status` is `ERROR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SetMetricResponse {
    /// Session completed
    pub fn ok(summary: &SessionSummary) -> Self {
        Self {
            status: summary.status,
            events_written: Some(summary.events_written),
            error: None,
        }
    }

    /// Session aborted
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Error,
            events_written: None,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// Query API Types
// =============================================================================

/// Aggregation query body
///
/// Accepts `uid` for `entity_id` and `interval` for `interval_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Entity to sum
    #[serde(alias = "uid")]
    pub entity_id: String,
    /// Window start
    pub from_time: WireTimestamp,
    /// Window end
    pub to_time: WireTimestamp,
    /// Requested number of buckets
    #[serde(alias = "interval")]
    pub interval_count: i64,
}

/// Error body for failed queries
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

// =============================================================================
// Health
// =============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Backing store identifier
    pub store: String,
}
