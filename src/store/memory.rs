//! In-memory record store
//!
//! A lightweight alternative to Redis for tests and local development. All
//! data lives in a `BTreeMap` keyed by time and is lost on restart.
//!
//! Fault switches let tests make `add` or `range_fetch` fail on demand.
//!
//! # Example
//!
//! ```rust
//! use kuba_counter::store::{InMemoryRecordStore, RecordStore};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = InMemoryRecordStore::new();
//! store.add("x:1:10", 10).await.unwrap();
//! store.add("x:2:20", 20).await.unwrap();
//!
//! let keys = store.range_fetch(0, 20).await.unwrap();
//! assert_eq!(keys, vec!["x:1:10".to_string()]);
//! # }
//! ```

use super::RecordStore;
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Sentinel meaning "never fail adds"
const NO_ADD_LIMIT: u64 = u64::MAX;

/// Process-local record store
pub struct InMemoryRecordStore {
    /// time_ns -> keys appended at that time, in insertion order
    records: RwLock<BTreeMap<i64, Vec<String>>>,
    /// Total keys held
    len: AtomicU64,
    /// Adds allowed before every further add fails
    add_budget: AtomicU64,
    /// When set, every range_fetch fails
    fail_range_fetch: AtomicBool,
}

impl InMemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            len: AtomicU64::new(0),
            add_budget: AtomicU64::new(NO_ADD_LIMIT),
            fail_range_fetch: AtomicBool::new(false),
        }
    }

    /// Let the next `n` adds succeed, then fail every add after that
    pub fn fail_adds_after(&self, n: u64) {
        self.add_budget.store(n, Ordering::SeqCst);
    }

    /// Make every `range_fetch` fail (or succeed again)
    pub fn fail_range_fetch(&self, fail: bool) {
        self.fail_range_fetch.store(fail, Ordering::SeqCst);
    }

    /// Number of keys stored
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed) as usize
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take one unit from the add budget; false once it is exhausted
    fn try_consume_add(&self) -> bool {
        self.add_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                NO_ADD_LIMIT => Some(NO_ADD_LIMIT),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn store_id(&self) -> &str {
        "in-memory-record-store-v1"
    }

    async fn add(&self, key: &str, time_ns: i64) -> Result<(), StoreError> {
        if !self.try_consume_add() {
            return Err(StoreError::Add(format!(
                "injected failure for key {key:?}"
            )));
        }

        self.records
            .write()
            .entry(time_ns)
            .or_default()
            .push(key.to_string());
        self.len.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn range_fetch(&self, start_ns: i64, end_ns: i64) -> Result<Vec<String>, StoreError> {
        if self.fail_range_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::RangeFetch {
                start: start_ns,
                end: end_ns,
                message: "injected failure".to_string(),
            });
        }
        if start_ns >= end_ns {
            return Ok(Vec::new());
        }

        let records = self.records.read();
        Ok(records
            .range(start_ns..end_ns)
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_range_is_half_open() {
        let store = InMemoryRecordStore::new();
        store.add("a:1:0", 0).await.unwrap();
        store.add("a:1:30", 30).await.unwrap();
        store.add("a:1:60", 60).await.unwrap();

        assert_eq!(store.range_fetch(0, 30).await.unwrap(), vec!["a:1:0"]);
        assert_eq!(store.range_fetch(30, 60).await.unwrap(), vec!["a:1:30"]);
        assert_eq!(store.range_fetch(0, 61).await.unwrap().len(), 3);
        assert!(store.range_fetch(60, 60).await.unwrap().is_empty());
        assert!(store.range_fetch(60, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_time_keeps_insertion_order() {
        let store = InMemoryRecordStore::new();
        store.add("a:1:5", 5).await.unwrap();
        store.add("b:2:5", 5).await.unwrap();
        store.add("a:1:5", 5).await.unwrap();

        assert_eq!(
            store.range_fetch(0, 10).await.unwrap(),
            vec!["a:1:5", "b:2:5", "a:1:5"]
        );
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_fail_adds_after() {
        let store = InMemoryRecordStore::new();
        store.fail_adds_after(2);

        assert!(store.add("a:1:1", 1).await.is_ok());
        assert!(store.add("a:1:2", 2).await.is_ok());
        assert!(matches!(
            store.add("a:1:3", 3).await,
            Err(StoreError::Add(_))
        ));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_fail_range_fetch() {
        let store = InMemoryRecordStore::new();
        store.fail_range_fetch(true);
        assert!(matches!(
            store.range_fetch(0, 10).await,
            Err(StoreError::RangeFetch { start: 0, end: 10, .. })
        ));

        store.fail_range_fetch(false);
        assert!(store.range_fetch(0, 10).await.unwrap().is_empty());
        assert!(store.is_empty());
    }
}
