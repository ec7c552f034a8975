//! Read path: windowed per-entity bucket sums
//!
//! # Architecture
//!
//! ```text
//! [AggregationRequest] → [RequestValidator] → BucketPlan
//!                                                │
//!                                                ▼
//!                        [RangeAggregator] → range_fetch per bucket → decode → sum
//! ```
//!
//! A request is validated without touching the store. The aggregator then
//! walks the window bucket by bucket and fails the whole query on the first
//! store or decode error.

pub mod aggregator;
pub mod validator;

pub use aggregator::{bucket_bounds, BucketBounds, RangeAggregator};
pub use validator::{BucketPlan, RequestValidator};

use crate::error::QueryError;
use crate::types::WireTimestamp;
use serde::{Deserialize, Serialize};

/// A validated-shape aggregation query
///
/// Times are nanoseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRequest {
    /// Entity to sum
    pub entity_id: String,
    /// Window start, inclusive
    pub from_ns: i64,
    /// Window end
    pub to_ns: i64,
    /// Requested number of buckets
    pub interval_count: i64,
}

impl AggregationRequest {
    /// Create a request from nanosecond bounds
    pub fn new(entity_id: impl Into<String>, from_ns: i64, to_ns: i64, interval_count: i64) -> Self {
        Self {
            entity_id: entity_id.into(),
            from_ns,
            to_ns,
            interval_count,
        }
    }

    /// Create a request from wire timestamps
    ///
    /// A timestamp that cannot be represented is an invalid request.
    pub fn from_wire(
        entity_id: impl Into<String>,
        from_time: WireTimestamp,
        to_time: WireTimestamp,
        interval_count: i64,
    ) -> Result<Self, QueryError> {
        let from_ns = from_time
            .to_nanos()
            .map_err(|e| QueryError::InvalidRequest(format!("invalid FROM time format: {}", e)))?;
        let to_ns = to_time
            .to_nanos()
            .map_err(|e| QueryError::InvalidRequest(format!("invalid TO time format: {}", e)))?;

        Ok(Self::new(entity_id, from_ns, to_ns, interval_count))
    }
}

/// Per-bucket sums for one entity, oldest bucket first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Entity the sums belong to
    #[serde(alias = "uid")]
    pub entity_id: String,
    /// One sum per realized bucket
    pub counts: Vec<i64>,
}
