//! Redis integration for record storage
//!
//! Provides a [`RecordStore`](crate::store::RecordStore) on Redis sorted sets,
//! one sorted set per slice of time, scored by record timestamp.
//!
//! # Architecture
//!
//! ```text
//! Redis Schema:
//! {namespace}::{slice_start_secs}   → ZSET(observed_at_ns → "<entity>:<count>:<ns>")
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use kuba_counter::redis::{RedisConfig, RedisPool, RedisRecordStore, RedisStoreConfig};
//! use kuba_counter::store::RecordStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = RedisPool::new(RedisConfig::default()).await?;
//! let store = RedisRecordStore::new(pool, RedisStoreConfig::default())?;
//!
//! store.add("8ed5:3:1700000000000000000", 1_700_000_000_000_000_000).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod store;
pub mod util;

pub use connection::{HealthStatus, PoolMetricsSnapshot, RedisConfig, RedisPool, RetryPolicy};
pub use store::{RedisRecordStore, RedisStoreConfig};
