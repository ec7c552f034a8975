//! Error types for the counting service

use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum Error {
    /// Ingestion session error
    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// Aggregation query error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Store error outside of a session or query
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Stored record could not be decoded
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while decoding an encoded record key
///
/// Any of these is what the rest of the crate calls a malformed record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Key did not split into exactly three fields
    #[error("expected 3 fields, found {found}")]
    FieldCount {
        /// Number of fields the key split into
        found: usize,
    },

    /// Count field is not a base-10 signed 64-bit integer
    #[error("invalid count field {value:?}")]
    InvalidCount {
        /// The offending field
        value: String,
    },

    /// Timestamp field is not a base-10 non-negative 64-bit integer
    #[error("invalid timestamp field {value:?}")]
    InvalidTimestamp {
        /// The offending field
        value: String,
    },
}

/// Errors returned by a [`RecordStore`](crate::store::RecordStore)
///
/// Every variant names the operation that failed so callers can tell a failed
/// write from a failed range read.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// `add` failed
    #[error("add failed: {0}")]
    Add(String),

    /// `range_fetch` failed
    #[error("range_fetch [{start}, {end}) failed: {message}")]
    RangeFetch {
        /// Start of the requested range (ns)
        start: i64,
        /// End of the requested range (ns)
        end: i64,
        /// Backend description of the failure
        message: String,
    },

    /// Backend connection could not be established or was lost
    #[error("connection error: {0}")]
    Connection(String),
}

/// Ingestion session errors
///
/// Either variant aborts the session. Records persisted before the failure
/// stay in the store.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// Store rejected a record
    #[error("db error: {0}")]
    Store(#[from] StoreError),

    /// Transport failed or delivered an unreadable event
    #[error("stream error: {0}")]
    Stream(String),
}

/// Aggregation query errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// Request failed validation; the store was never touched
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A stored key in the window could not be decoded
    #[error("db error: invalid entry found in database: {0}")]
    MalformedRecord(#[from] RecordError),

    /// The store failed while fetching a bucket
    #[error("db error: {0}")]
    Store(#[from] StoreError),

    /// Bucket sum exceeded the i64 range
    #[error("db error: bucket sum overflow in bucket {bucket}")]
    SumOverflow {
        /// Zero-based index of the overflowing bucket
        bucket: usize,
    },
}

impl QueryError {
    /// Whether the failure came from the request itself rather than the store
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, QueryError::InvalidRequest(_))
    }
}

impl IngestionError {
    /// Whether the failure came from the client side of the session
    pub fn is_stream_error(&self) -> bool {
        matches!(self, IngestionError::Stream(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
