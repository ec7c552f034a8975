//! Kuba Counter - per-entity event counting with windowed bucket sums
//!
//! This library provides:
//! - Streamed ingestion sessions that persist one record per count event
//! - A compact `"<entity_id>:<count>:<observed_at_ns>"` record key codec
//! - Windowed aggregation reconstructing per-bucket sums from stored records
//! - Pluggable record stores (Redis sorted sets, in-memory)
//! - An axum HTTP surface with Prometheus metrics

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod store;
pub mod types;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Redis integration for record storage
/// Stores records in per-slice Sorted Sets scored by observation time
pub mod redis;

/// Write path: NDJSON framing and the ingestion writer
pub mod ingestion;

/// Read path: request validation and range aggregation
pub mod query;

/// Service facade combining ingestion and queries over one store
pub mod service;

/// HTTP router, handlers and wire types
pub mod http;

// Re-export main types
pub use error::{Error, IngestionError, QueryError, RecordError, Result, StoreError};
pub use query::{AggregationRequest, QueryResponse};
pub use service::MetricService;
pub use store::{InMemoryRecordStore, RecordStore};
pub use types::{MetricEvent, MetricRecord, WireTimestamp};
