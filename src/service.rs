//! Service facade: the two RPC-shaped operations over a shared store
//!
//! `set_metric` runs one ingestion session; `get_metric` validates and
//! aggregates one query. Calls are independent and may run concurrently;
//! they share nothing but the store handle.

use crate::error::{Error, IngestionError, QueryError};
use crate::ingestion::{IngestionMetrics, IngestionWriter, SessionSummary};
use crate::metrics as prom;
use crate::query::{AggregationRequest, QueryResponse, RangeAggregator, RequestValidator};
use crate::store::RecordStore;
use crate::types::{Clock, MetricEvent};

use futures::Stream;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Metric service over a record store
#[derive(Clone)]
pub struct MetricService {
    store: Arc<dyn RecordStore>,
    writer: IngestionWriter,
    validator: RequestValidator,
    aggregator: RangeAggregator,
}

impl MetricService {
    /// Create a service with the given granularity floor in seconds
    pub fn new(store: Arc<dyn RecordStore>, granularity_secs: i64) -> Result<Self, Error> {
        let validator = RequestValidator::new(granularity_secs)?;
        info!(
            store = store.store_id(),
            granularity_secs, "Metric service initialized"
        );

        Ok(Self {
            writer: IngestionWriter::new(store.clone()),
            aggregator: RangeAggregator::new(store.clone()),
            validator,
            store,
        })
    }

    /// Stamp records with a different clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.writer = self.writer.with_clock(clock);
        self
    }

    /// Backing store
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Ingestion counters shared by every session
    pub fn ingestion_metrics(&self) -> &Arc<IngestionMetrics> {
        self.writer.metrics()
    }

    /// Run one ingestion session to completion
    pub async fn set_metric<S>(&self, events: S) -> Result<SessionSummary, IngestionError>
    where
        S: Stream<Item = Result<MetricEvent, IngestionError>>,
    {
        self.writer.run_session(events).await
    }

    /// Validate and aggregate one query
    pub async fn get_metric(&self, request: &AggregationRequest) -> Result<QueryResponse, QueryError> {
        let start = Instant::now();

        let result = match self.validator.validate(request) {
            Ok(plan) => self.aggregator.aggregate(request, plan.slot_secs).await,
            Err(e) => Err(e),
        };
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(counts) => {
                prom::record_query("ok", elapsed, Some(counts.len()));
                Ok(QueryResponse {
                    entity_id: request.entity_id.clone(),
                    counts,
                })
            },
            Err(e) => {
                let outcome = if e.is_invalid_request() {
                    "invalid_request"
                } else {
                    "db_error"
                };
                prom::record_query(outcome, elapsed, None);
                warn!(
                    entity_id = %request.entity_id,
                    outcome,
                    error = %e,
                    "Aggregation query failed"
                );
                Err(e)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use crate::types::{ManualClock, NANOS_PER_SECOND as NS};
    use futures::stream;

    #[tokio::test]
    async fn test_invalid_request_never_reaches_store() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.fail_range_fetch(true);
        let service = MetricService::new(store, 15).unwrap();

        let err = service
            .get_metric(&AggregationRequest::new("x", 0, 100 * NS, 10))
            .await
            .unwrap_err();
        assert!(err.is_invalid_request());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = Arc::new(InMemoryRecordStore::new());
        let service = MetricService::new(store, 1)
            .unwrap()
            .with_clock(Arc::new(ManualClock::with_step(10 * NS, NS)));

        let events = stream::iter(vec![Ok(MetricEvent::new("x", 2)), Ok(MetricEvent::new("x", 4))]);
        service.set_metric(events).await.unwrap();

        let response = service
            .get_metric(&AggregationRequest::new("x", 10 * NS, 20 * NS, 2))
            .await
            .unwrap();
        assert_eq!(response.entity_id, "x");
        assert_eq!(response.counts, vec![6, 0]);
    }

    #[test]
    fn test_rejects_zero_granularity() {
        let store = Arc::new(InMemoryRecordStore::new());
        assert!(MetricService::new(store, 0).is_err());
    }
}
