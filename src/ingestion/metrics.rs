//! Ingestion-specific metrics collection
//!
//! Per-writer counters for sessions and events. Uses atomics so concurrent
//! sessions can share one collector without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Ingestion metrics collector
#[derive(Debug)]
pub struct IngestionMetrics {
    // === Session Counters ===
    /// Sessions opened
    sessions_opened: AtomicU64,
    /// Sessions that reached end of input
    sessions_completed: AtomicU64,
    /// Sessions aborted by an error
    sessions_failed: AtomicU64,

    // === Event Counters ===
    /// Events pulled off session streams
    events_received: AtomicU64,
    /// Records persisted to the store
    events_written: AtomicU64,

    // === Error Counters ===
    /// Store `add` failures
    store_errors: AtomicU64,
    /// Transport or framing failures
    stream_errors: AtomicU64,

    // === Latency Tracking (simple average) ===
    /// Sum of store add latencies in microseconds
    write_latency_sum_us: AtomicU64,
    /// Count of store add latency samples
    write_latency_count: AtomicU64,

    /// When metrics collection started
    start_time: Instant,
}

impl IngestionMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
            events_written: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            stream_errors: AtomicU64::new(0),
            write_latency_sum_us: AtomicU64::new(0),
            write_latency_count: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    // === Recording Methods ===

    #[inline]
    pub(crate) fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_session_completed(&self) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a persisted event
    #[inline]
    pub(crate) fn record_write(&self, latency: Duration) {
        let _ = self
            .events_written
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_add(1))
            });

        let latency_us = latency.as_micros() as u64;
        let _ = self.write_latency_sum_us.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |current| Some(current.saturating_add(latency_us)),
        );
        self.write_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_stream_error(&self) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
    }

    // === Query Methods ===

    /// Get a point-in-time snapshot
    pub fn snapshot(&self) -> IngestionMetricsSnapshot {
        let latency_count = self.write_latency_count.load(Ordering::Relaxed);
        let avg_write_latency_us = if latency_count == 0 {
            0
        } else {
            self.write_latency_sum_us.load(Ordering::Relaxed) / latency_count
        };

        IngestionMetricsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            events_written: self.events_written.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            stream_errors: self.stream_errors.load(Ordering::Relaxed),
            avg_write_latency_us,
            uptime: self.start_time.elapsed(),
        }
    }
}

impl Default for IngestionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of ingestion metrics
#[derive(Debug, Clone, Default)]
pub struct IngestionMetricsSnapshot {
    /// Sessions opened
    pub sessions_opened: u64,
    /// Sessions completed successfully
    pub sessions_completed: u64,
    /// Sessions aborted
    pub sessions_failed: u64,
    /// Events received
    pub events_received: u64,
    /// Events persisted
    pub events_written: u64,
    /// Store add failures
    pub store_errors: u64,
    /// Stream failures
    pub stream_errors: u64,
    /// Average store add latency in microseconds
    pub avg_write_latency_us: u64,
    /// Time since the collector was created
    pub uptime: Duration,
}
