//! Write path: streamed count events into durable records
//!
//! # Architecture
//!
//! ```text
//! [NDJSON body] → [stream::ndjson_events] → [IngestionWriter] → [RecordStore::add]
//!                                                  ↓
//!                                             [Metrics]
//! ```
//!
//! # Components
//!
//! - **Stream**: line framing of a chunked request body into events
//! - **Writer**: one session per stream, one record per event
//! - **Metrics**: per-writer atomic counters
//!
//! # Example
//!
//! ```rust
//! use kuba_counter::ingestion::{ndjson_events, IngestionWriter, DEFAULT_MAX_LINE_BYTES};
//! use kuba_counter::store::InMemoryRecordStore;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(InMemoryRecordStore::new());
//! let writer = IngestionWriter::new(store.clone());
//!
//! let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
//!     b"{\"entity_id\":\"8ed5\",\"count\":3}\n",
//! ))]);
//! let summary = writer
//!     .run_session(ndjson_events(body, DEFAULT_MAX_LINE_BYTES))
//!     .await
//!     .unwrap();
//! assert_eq!(summary.events_written, 1);
//! # }
//! ```

pub mod metrics;
pub mod stream;
pub mod writer;

pub use metrics::{IngestionMetrics, IngestionMetricsSnapshot};
pub use stream::{ndjson_events, DEFAULT_MAX_LINE_BYTES};
pub use writer::{
    IngestionWriter, SessionOutcome, SessionState, SessionStatus, SessionSummary,
};
