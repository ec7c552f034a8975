//! Redis-backed record store
//!
//! Records are spread over sorted sets, one per `timestep_secs` slice of time:
//!
//! ```text
//! {namespace}::{bucket_start_secs}   → ZSET(observed_at_ns → encoded record)
//! ```
//!
//! A range read walks every slice overlapping the range and issues a
//! `ZRANGEBYSCORE key start (end` per slice in one pipeline, so results come
//! back ordered by slice and by score within a slice.
//!
//! Scores are nanosecond timestamps stored as Redis doubles, which resolve
//! present-day instants to roughly 256ns. A record within that distance of a
//! range boundary can land on either side of it; keys themselves keep full
//! precision.

use super::connection::{HealthStatus, PoolMetricsSnapshot, RedisPool};
use crate::error::StoreError;
use crate::store::RecordStore;
use crate::types::unix_seconds;

use async_trait::async_trait;
use tracing::{debug, info};

/// Maximum ZRANGEBYSCORE commands sent in one pipeline
const MAX_KEYS_PER_PIPELINE: usize = 512;

/// Layout of the record keyspace
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Prefix of every slice key
    pub namespace: String,
    /// Width of one sorted-set slice in seconds
    pub timestep_secs: i64,
    /// Expiry applied to a slice on every write (0 = never expire)
    pub key_ttl_secs: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            namespace: "counter::records".to_string(),
            timestep_secs: 15,
            key_ttl_secs: 0,
        }
    }
}

impl RedisStoreConfig {
    /// Validate the keyspace layout
    pub fn validate(&self) -> Result<(), String> {
        if self.namespace.is_empty() {
            return Err("Redis namespace cannot be empty".to_string());
        }
        if self.timestep_secs <= 0 {
            return Err("Redis timestep_secs must be > 0".to_string());
        }
        Ok(())
    }

    /// Start (in seconds) of the slice holding `time_ns`
    pub fn slice_start(&self, time_ns: i64) -> i64 {
        unix_seconds(time_ns).div_euclid(self.timestep_secs) * self.timestep_secs
    }

    /// Key of the slice holding `time_ns`
    pub fn slice_key(&self, time_ns: i64) -> String {
        format!("{}::{}", self.namespace, self.slice_start(time_ns))
    }

    /// Keys of every slice overlapping `[start_ns, end_ns)`, in time order
    ///
    /// Keys are produced lazily; a window spanning centuries yields them one
    /// at a time.
    pub fn slice_keys(&self, start_ns: i64, end_ns: i64) -> impl Iterator<Item = String> + '_ {
        let slices = if start_ns < end_ns {
            self.slice_start(start_ns)..=self.slice_start(end_ns - 1)
        } else {
            1..=0
        };
        let step = usize::try_from(self.timestep_secs).unwrap_or(1).max(1);

        slices
            .step_by(step)
            .map(move |slice| format!("{}::{}", self.namespace, slice))
    }
}

/// Record store on Redis sorted sets
pub struct RedisRecordStore {
    pool: RedisPool,
    config: RedisStoreConfig,
}

impl RedisRecordStore {
    /// Wrap an established pool
    pub fn new(pool: RedisPool, config: RedisStoreConfig) -> Result<Self, StoreError> {
        config.validate().map_err(StoreError::Connection)?;
        info!(
            namespace = %config.namespace,
            timestep_secs = config.timestep_secs,
            key_ttl_secs = config.key_ttl_secs,
            "Redis record store initialized"
        );
        Ok(Self { pool, config })
    }

    /// Ping Redis and return the resulting status
    pub async fn health_check(&self) -> HealthStatus {
        self.pool.health_check().await
    }

    /// Pool metrics
    pub fn pool_metrics(&self) -> PoolMetricsSnapshot {
        self.pool.metrics()
    }
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    fn store_id(&self) -> &str {
        "redis-record-store-v1"
    }

    async fn add(&self, key: &str, time_ns: i64) -> Result<(), StoreError> {
        let slice = self.config.slice_key(time_ns);
        let ttl = self.config.key_ttl_secs;

        self.pool
            .execute(|mut conn| {
                let slice = slice.clone();
                let member = key.to_string();
                async move {
                    let mut pipe = redis::pipe();
                    pipe.cmd("ZADD").arg(&slice).arg(time_ns).arg(&member).ignore();
                    if ttl > 0 {
                        pipe.cmd("EXPIRE").arg(&slice).arg(ttl).ignore();
                    }
                    pipe.query_async::<()>(&mut conn).await
                }
            })
            .await
            .map_err(StoreError::Add)
    }

    async fn range_fetch(&self, start_ns: i64, end_ns: i64) -> Result<Vec<String>, StoreError> {
        let mut slices = self.config.slice_keys(start_ns, end_ns);
        let upper = format!("({}", end_ns);
        let mut keys = Vec::new();
        let mut slice_count = 0usize;

        loop {
            let group: Vec<String> = slices.by_ref().take(MAX_KEYS_PER_PIPELINE).collect();
            if group.is_empty() {
                break;
            }
            slice_count += group.len();

            let fetched: Vec<Vec<String>> = self
                .pool
                .execute(|mut conn| {
                    let upper = upper.clone();
                    let group = &group;
                    async move {
                        let mut pipe = redis::pipe();
                        for slice in group {
                            pipe.cmd("ZRANGEBYSCORE")
                                .arg(slice)
                                .arg(start_ns)
                                .arg(&upper);
                        }
                        pipe.query_async::<Vec<Vec<String>>>(&mut conn).await
                    }
                })
                .await
                .map_err(|message| StoreError::RangeFetch {
                    start: start_ns,
                    end: end_ns,
                    message,
                })?;

            keys.extend(fetched.into_iter().flatten());
        }

        debug!(
            start_ns,
            end_ns,
            slices = slice_count,
            keys = keys.len(),
            "Fetched record range"
        );
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: i64 = 1_000_000_000;

    fn layout() -> RedisStoreConfig {
        RedisStoreConfig {
            namespace: "test".to_string(),
            timestep_secs: 15,
            key_ttl_secs: 0,
        }
    }

    #[test]
    fn test_slice_key() {
        let config = layout();
        assert_eq!(config.slice_key(0), "test::0");
        assert_eq!(config.slice_key(14 * NS + 999), "test::0");
        assert_eq!(config.slice_key(15 * NS), "test::15");
        assert_eq!(config.slice_key(-1), "test::-15");
    }

    #[test]
    fn test_slice_keys_cover_range() {
        let config = layout();
        let keys = |start, end| config.slice_keys(start, end).collect::<Vec<_>>();

        assert_eq!(keys(0, 30 * NS), vec!["test::0", "test::15"]);
        assert_eq!(
            keys(10 * NS, 31 * NS),
            vec!["test::0", "test::15", "test::30"]
        );
        assert_eq!(keys(16 * NS, 17 * NS), vec!["test::15"]);
        assert_eq!(keys(-1, 1), vec!["test::-15", "test::0"]);
    }

    #[test]
    fn test_slice_keys_empty_range() {
        let config = layout();
        assert_eq!(config.slice_keys(30 * NS, 30 * NS).count(), 0);
        assert_eq!(config.slice_keys(30 * NS, 0).count(), 0);
    }

    #[test]
    fn test_slice_keys_widest_window_is_lazy() {
        let config = layout();
        // Whole i64 nanosecond range, about 1.2e9 slices
        let mut keys = config.slice_keys(i64::MIN, i64::MAX);

        assert_eq!(keys.next(), Some(config.slice_key(i64::MIN)));
        let second = config.slice_start(i64::MIN) + 15;
        assert_eq!(keys.next(), Some(format!("test::{}", second)));

        let batch: Vec<_> = keys.by_ref().take(MAX_KEYS_PER_PIPELINE).collect();
        assert_eq!(batch.len(), MAX_KEYS_PER_PIPELINE);
        assert!(keys.next().is_some());
    }

    #[test]
    fn test_slice_keys_reach_range_end() {
        let config = layout();
        let end = 1_000_000 * NS;
        let last = config.slice_keys(0, end).last();

        assert_eq!(last, Some(config.slice_key(end - 1)));
        assert_eq!(config.slice_keys(0, end).count(), 1_000_000 / 15 + 1);
    }

    #[test]
    fn test_layout_validation() {
        assert!(layout().validate().is_ok());

        let mut config = layout();
        config.timestep_secs = 0;
        assert!(config.validate().is_err());

        let mut config = layout();
        config.namespace.clear();
        assert!(config.validate().is_err());
    }
}
