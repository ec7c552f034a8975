//! Time-indexed record store contract
//!
//! The service treats the store as an external collaborator. It only needs
//! two operations: append a key at a time, and list the keys whose time falls
//! inside a range. Persistence, replication and retention belong to the
//! implementation.
//!
//! Implementations must tolerate concurrent `add` and `range_fetch` calls;
//! the service does no locking of its own.
//!
//! # Available Stores
//!
//! - [`InMemoryRecordStore`]: process-local, for tests and development
//! - [`RedisRecordStore`](crate::redis::RedisRecordStore): Redis sorted sets

pub mod memory;

pub use memory::InMemoryRecordStore;

use crate::error::StoreError;
use async_trait::async_trait;

/// Core trait for record store backends
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Identifier for this backend, used in logs and health output
    fn store_id(&self) -> &str;

    /// Append an encoded record key at `time_ns`
    ///
    /// Each call is an independent append. The store is never asked to
    /// deduplicate.
    async fn add(&self, key: &str, time_ns: i64) -> Result<(), StoreError>;

    /// Fetch every key with time in `[start_ns, end_ns)`
    ///
    /// Keys come back ordered by time; keys sharing a time keep insertion order.
    async fn range_fetch(&self, start_ns: i64, end_ns: i64) -> Result<Vec<String>, StoreError>;
}
