//! Range aggregation over stored records
//!
//! # Bucket tiling
//!
//! Buckets start at the full-precision window start and advance by `slot`
//! whole seconds. A new bucket opens while the whole-second part of its start
//! is still before the whole-second part of the window end:
//!
//! ```text
//! from=0s  to=100s  N=3  → slot=33s
//!
//! [0,33) [33,66) [66,99) [99,132)
//!                        └─ 4th bucket, runs past `to`
//! ```
//!
//! So the number of buckets can exceed the requested count and the last
//! bucket can end after the window. A sub-second part of the window start is
//! carried into every bucket boundary.
//!
//! # Failure
//!
//! Any store error or undecodable key fails the whole query. No partial
//! bucket sequence is ever returned.

use super::AggregationRequest;
use crate::codec;
use crate::error::QueryError;
use crate::metrics as prom;
use crate::store::RecordStore;
use crate::types::{unix_seconds, NANOS_PER_SECOND};

use std::sync::Arc;
use tracing::{debug, error, trace};

/// Iterator over `(begin_ns, end_ns)` bucket bounds of a query window
#[derive(Debug, Clone)]
pub struct BucketBounds {
    from_ns: i64,
    slot_ns: i64,
    next: u64,
    count: u64,
}

impl BucketBounds {
    /// Number of buckets the window realizes
    pub fn bucket_count(&self) -> u64 {
        self.count
    }
}

impl Iterator for BucketBounds {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        // In range: the end of the last bucket was checked at construction
        let begin = self.from_ns + self.next as i64 * self.slot_ns;
        self.next += 1;
        Some((begin, begin + self.slot_ns))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BucketBounds {}

/// Compute the bucket bounds for a window and bucket width
///
/// Fails with an invalid request when `slot_secs` is not positive or the last
/// bucket's end does not fit in `i64` nanoseconds.
pub fn bucket_bounds(from_ns: i64, to_ns: i64, slot_secs: i64) -> Result<BucketBounds, QueryError> {
    if slot_secs <= 0 {
        return Err(QueryError::InvalidRequest(format!(
            "bucket width must be positive, got {}s",
            slot_secs
        )));
    }

    let from_secs = unix_seconds(from_ns);
    let to_secs = unix_seconds(to_ns);

    // begin advances by whole seconds, so its whole-second part is from_secs + i * slot
    let count = if to_secs > from_secs {
        let span = (to_secs - from_secs) as u64;
        let slot = slot_secs as u64;
        span.div_ceil(slot)
    } else {
        0
    };

    let overflow = || {
        QueryError::InvalidRequest(format!(
            "bucket bounds overflow the timestamp range (from={}ns, slot={}s, buckets={})",
            from_ns, slot_secs, count
        ))
    };

    let slot_ns = slot_secs.checked_mul(NANOS_PER_SECOND).ok_or_else(overflow)?;
    i64::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(slot_ns))
        .and_then(|span| from_ns.checked_add(span))
        .ok_or_else(overflow)?;

    Ok(BucketBounds {
        from_ns,
        slot_ns,
        next: 0,
        count,
    })
}

/// Sums one entity's counts per bucket over a record store
#[derive(Clone)]
pub struct RangeAggregator {
    store: Arc<dyn RecordStore>,
}

impl RangeAggregator {
    /// Create an aggregator over a store
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Compute per-bucket sums for a validated request
    ///
    /// `slot_secs` is the bucket width produced by the validator. Buckets are
    /// fetched one at a time in chronological order.
    pub async fn aggregate(
        &self,
        request: &AggregationRequest,
        slot_secs: i64,
    ) -> Result<Vec<i64>, QueryError> {
        let bounds = bucket_bounds(request.from_ns, request.to_ns, slot_secs)?;
        let mut counts = Vec::with_capacity(bounds.len().min(4096));

        for (bucket, (begin, end)) in bounds.enumerate() {
            let keys = self.store.range_fetch(begin, end).await.map_err(|e| {
                prom::record_store_error("range_fetch");
                QueryError::Store(e)
            })?;

            let mut sum: i64 = 0;
            for key in &keys {
                let record = codec::decode(key).map_err(|e| {
                    error!(key = %key, bucket, error = %e, "Malformed record in store");
                    QueryError::MalformedRecord(e)
                })?;
                if record.entity_id != request.entity_id {
                    continue;
                }
                sum = sum
                    .checked_add(record.count)
                    .ok_or(QueryError::SumOverflow { bucket })?;
            }

            trace!(bucket, begin, end, keys = keys.len(), sum, "Bucket aggregated");
            counts.push(sum);
        }

        debug!(
            entity_id = %request.entity_id,
            buckets = counts.len(),
            slot_secs,
            "Aggregation complete"
        );
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;

    const NS: i64 = NANOS_PER_SECOND;

    #[test]
    fn test_bounds_exact_division() {
        let bounds: Vec<_> = bucket_bounds(0, 100 * NS, 10).unwrap().collect();
        assert_eq!(bounds.len(), 10);
        assert_eq!(bounds[0], (0, 10 * NS));
        assert_eq!(bounds[9], (90 * NS, 100 * NS));
    }

    #[test]
    fn test_bounds_extra_bucket_past_window() {
        let bounds: Vec<_> = bucket_bounds(0, 100 * NS, 33).unwrap().collect();
        assert_eq!(bounds.len(), 4);
        assert_eq!(bounds[3], (99 * NS, 132 * NS));
    }

    #[test]
    fn test_bounds_keep_sub_second_start() {
        let from = 5 * NS + 250;
        let bounds: Vec<_> = bucket_bounds(from, 35 * NS, 15).unwrap().collect();
        assert_eq!(bounds, vec![(from, from + 15 * NS), (from + 15 * NS, from + 30 * NS)]);
    }

    #[test]
    fn test_bounds_sub_second_end_is_floored() {
        // to = 30.9s floors to 30s: two buckets, not three
        assert_eq!(bucket_bounds(0, 30 * NS + 900_000_000, 15).unwrap().len(), 2);
    }

    #[test]
    fn test_bounds_empty_window() {
        assert_eq!(bucket_bounds(50 * NS, 50 * NS, 15).unwrap().len(), 0);
    }

    #[test]
    fn test_bounds_rejects_bad_slot_and_overflow() {
        assert!(bucket_bounds(0, 100 * NS, 0).unwrap_err().is_invalid_request());
        assert!(bucket_bounds(i64::MAX - 10 * NS, i64::MAX, 15)
            .unwrap_err()
            .is_invalid_request());
    }

    #[tokio::test]
    async fn test_aggregate_filters_entity() {
        let store = Arc::new(InMemoryRecordStore::new());
        for (entity, count, t) in [("x", 1, 0), ("x", 2, 5), ("x", 3, 50), ("y", 100, 5)] {
            let ns = t * NS;
            store.add(&codec::encode(entity, count, ns), ns).await.unwrap();
        }

        let aggregator = RangeAggregator::new(store);
        let counts = aggregator
            .aggregate(&AggregationRequest::new("x", 0, 60 * NS, 2), 30)
            .await
            .unwrap();
        assert_eq!(counts, vec![3, 3]);
    }

    #[tokio::test]
    async fn test_aggregate_fails_on_malformed_key() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.add("x:1:0", 0).await.unwrap();
        store.add("garbage", 40 * NS).await.unwrap();

        let err = RangeAggregator::new(store)
            .aggregate(&AggregationRequest::new("x", 0, 60 * NS, 2), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn test_aggregate_detects_overflow() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.add(&codec::encode("x", i64::MAX, 1), 1).await.unwrap();
        store.add(&codec::encode("x", 1, 2), 2).await.unwrap();

        let err = RangeAggregator::new(store)
            .aggregate(&AggregationRequest::new("x", 0, 30 * NS, 1), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::SumOverflow { bucket: 0 }));
    }
}
