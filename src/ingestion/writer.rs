//! Ingestion writer: one streamed session in, one durable record per event out
//!
//! A session is a stream of [`MetricEvent`]s ending with an explicit
//! end-of-input (the stream returning `None`). Each event is stamped with the
//! writer's clock, encoded and appended to the store on its own; nothing is
//! batched or deduplicated, and the writer assumes nothing about the pacing
//! between events.
//!
//! ```text
//!   Open ──event──▶ Writing ──add ok──▶ Open ──end──▶ Closed(Ok)
//!                      │                  │
//!                  add failed       stream error
//!                      ▼                  ▼
//!               Closed(Failed)     Closed(Failed)
//! ```
//!
//! A failure aborts the session immediately. Records written earlier in the
//! session stay in the store; there is no rollback.
//!
//! # Example
//!
//! ```rust
//! use kuba_counter::ingestion::{IngestionWriter, SessionStatus};
//! use kuba_counter::store::InMemoryRecordStore;
//! use kuba_counter::types::MetricEvent;
//! use futures::stream;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(InMemoryRecordStore::new());
//! let writer = IngestionWriter::new(store.clone());
//!
//! let events = stream::iter(vec![
//!     Ok(MetricEvent::new("8ed5", 3)),
//!     Ok(MetricEvent::new("8ed5", 3)),
//! ]);
//! let summary = writer.run_session(events).await.unwrap();
//! assert_eq!(summary.status, SessionStatus::Ok);
//! assert_eq!(store.len(), 2);
//! # }
//! ```

use crate::codec;
use crate::error::IngestionError;
use crate::metrics as prom;
use crate::store::RecordStore;
use crate::types::{Clock, MetricEvent, MetricRecord, SystemClock};

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use super::metrics::IngestionMetrics;

/// Lifecycle of an ingestion session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next event or end of input
    Open,
    /// Persisting the current event
    Writing,
    /// Terminal
    Closed(SessionOutcome),
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// End of input reached, every event persisted
    Completed,
    /// Aborted by a store or stream failure
    Failed,
}

/// Acknowledgement status sent at the end of a session
///
/// There is no partial-success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    /// Session completed
    Ok,
    /// Session aborted on its first failure
    Error,
}

/// Result of a completed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Always [`SessionStatus::Ok`]; failures are returned as errors
    pub status: SessionStatus,
    /// Records persisted during the session
    pub events_written: u64,
}

/// Persists streamed count events to a record store
#[derive(Clone)]
pub struct IngestionWriter {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionWriter {
    /// Create a writer stamping records with the system clock
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Use a different clock for `observed_at`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a metrics collector across writers
    pub fn with_metrics(mut self, metrics: Arc<IngestionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics collector for this writer
    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// Persist a single event
    ///
    /// Stamps the event with the current clock reading, encodes it and appends
    /// it to the store.
    pub async fn write_event(&self, event: &MetricEvent) -> Result<MetricRecord, IngestionError> {
        if codec::contains_delimiter(&event.entity_id) {
            warn!(
                entity_id = %event.entity_id,
                "entity_id contains the key delimiter; the stored record will not decode"
            );
        }

        let record = MetricRecord::from_event(event, self.clock.now_nanos());
        let key = record.encode();
        let start = Instant::now();

        match self.store.add(&key, record.observed_at).await {
            Ok(()) => {
                self.metrics.record_write(start.elapsed());
                prom::record_event_ingested();
                trace!(key = %key, "Record persisted");
                Ok(record)
            },
            Err(e) => {
                self.metrics.record_store_error();
                prom::record_store_error("add");
                Err(IngestionError::Store(e))
            },
        }
    }

    /// Drive one session to completion
    ///
    /// Returns once the stream ends (success) or on the first store or stream
    /// error (failure). The stream is not polled again after a failure.
    pub async fn run_session<S>(&self, events: S) -> Result<SessionSummary, IngestionError>
    where
        S: Stream<Item = Result<MetricEvent, IngestionError>>,
    {
        let mut events = std::pin::pin!(events);
        let mut state = SessionState::Open;
        let mut events_written = 0u64;

        self.metrics.record_session_opened();
        debug!(store = self.store.store_id(), "Ingestion session opened");

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    self.metrics.record_stream_error();
                    return Err(self.fail(&mut state, events_written, e));
                },
            };

            self.metrics.record_received();
            state = SessionState::Writing;

            if let Err(e) = self.write_event(&event).await {
                return Err(self.fail(&mut state, events_written, e));
            }
            events_written += 1;
            state = SessionState::Open;
        }

        debug_assert_eq!(state, SessionState::Open);
        state = SessionState::Closed(SessionOutcome::Completed);
        self.metrics.record_session_completed();
        prom::record_session("ok");
        debug!(events_written, ?state, "Ingestion session closed");

        Ok(SessionSummary {
            status: SessionStatus::Ok,
            events_written,
        })
    }

    /// Move to the failed terminal state and hand back the error
    fn fail(
        &self,
        state: &mut SessionState,
        events_written: u64,
        error: IngestionError,
    ) -> IngestionError {
        let during = *state;
        *state = SessionState::Closed(SessionOutcome::Failed);
        self.metrics.record_session_failed();
        prom::record_session(if error.is_stream_error() {
            "stream_error"
        } else {
            "store_error"
        });
        warn!(
            events_written,
            state = ?during,
            error = %error,
            "Ingestion session aborted"
        );
        error
    }
}
