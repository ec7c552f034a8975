//! Request validation
//!
//! Checks a query's window and bucket count against the store granularity and
//! computes the bucket width. Validation is pure: the store is never touched.

use super::AggregationRequest;
use crate::error::{Error, QueryError};
use crate::types::unix_seconds;

/// Default granularity floor in seconds
pub const DEFAULT_GRANULARITY_SECS: i64 = 15;

/// Outcome of a successful validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPlan {
    /// Whole-second part of the window start
    pub from_secs: i64,
    /// Whole-second part of the window end
    pub to_secs: i64,
    /// Bucket width in seconds, always >= the granularity
    pub slot_secs: i64,
}

/// Validates aggregation requests against a granularity floor
#[derive(Debug, Clone, Copy)]
pub struct RequestValidator {
    granularity_secs: i64,
}

impl RequestValidator {
    /// Create a validator; the granularity must be at least one second
    pub fn new(granularity_secs: i64) -> Result<Self, Error> {
        if granularity_secs < 1 {
            return Err(Error::Configuration(format!(
                "granularity must be >= 1 second, got {}",
                granularity_secs
            )));
        }
        Ok(Self { granularity_secs })
    }

    /// Granularity floor in seconds
    pub fn granularity_secs(&self) -> i64 {
        self.granularity_secs
    }

    /// Validate a request and compute its bucket width
    ///
    /// Whole seconds are taken by flooring each bound. Rejects a reversed
    /// window, a non-positive bucket count, and buckets narrower than the
    /// granularity.
    pub fn validate(&self, request: &AggregationRequest) -> Result<BucketPlan, QueryError> {
        let from_secs = unix_seconds(request.from_ns);
        let to_secs = unix_seconds(request.to_ns);

        if from_secs > to_secs {
            return Err(QueryError::InvalidRequest(format!(
                "from_time ({}s) is after to_time ({}s)",
                from_secs, to_secs
            )));
        }
        if request.interval_count <= 0 {
            return Err(QueryError::InvalidRequest(format!(
                "interval count must be positive, got {}",
                request.interval_count
            )));
        }

        // Both bounds are within i64 ns, so the difference in seconds cannot overflow
        let slot_secs = (to_secs - from_secs) / request.interval_count;
        if slot_secs < self.granularity_secs {
            return Err(QueryError::InvalidRequest(format!(
                "bucket width {}s is below the {}s granularity",
                slot_secs, self.granularity_secs
            )));
        }

        Ok(BucketPlan {
            from_secs,
            to_secs,
            slot_secs,
        })
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self {
            granularity_secs: DEFAULT_GRANULARITY_SECS,
        }
    }
}
