//! Core data types used throughout the counting service
//!
//! # Key Types
//!
//! - **`MetricEvent`**: one client observation (entity + count), no timestamp
//! - **`MetricRecord`**: the durable unit, an event stamped with `observed_at`
//! - **`WireTimestamp`**: seconds + nanos interchange form used on the wire
//!
//! All internal time arithmetic uses `i64` nanoseconds since the Unix epoch.
//!
//! # Example
//!
//! ```rust
//! use kuba_counter::types::{MetricEvent, WireTimestamp};
//!
//! let event = MetricEvent::new("8ed5", 3);
//! assert_eq!(event.count, 3);
//!
//! let ts = WireTimestamp { seconds: 1_700_000_000, nanos: 500 };
//! assert_eq!(ts.to_nanos().unwrap(), 1_700_000_000_000_000_500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanoseconds in one second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Smallest seconds value a wire timestamp may carry (0001-01-01T00:00:00Z)
pub const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;

/// Largest seconds value a wire timestamp may carry (9999-12-31T23:59:59Z)
pub const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;

/// A single count observation pushed by a client
///
/// `count` is one observation, not a running total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEvent {
    /// Entity the observation belongs to
    #[serde(alias = "uid")]
    pub entity_id: String,
    /// Observed count
    pub count: i64,
}

impl MetricEvent {
    /// Create a new event
    pub fn new(entity_id: impl Into<String>, count: i64) -> Self {
        Self {
            entity_id: entity_id.into(),
            count,
        }
    }
}

/// The durable unit written to the store
///
/// Immutable once created. Two records with the same entity and count are
/// still distinct because `observed_at` differs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricRecord {
    /// Entity the record belongs to
    pub entity_id: String,
    /// Observed count
    pub count: i64,
    /// Persist time in nanoseconds since the Unix epoch
    pub observed_at: i64,
}

impl MetricRecord {
    /// Stamp an event with its persist time
    pub fn from_event(event: &MetricEvent, observed_at: i64) -> Self {
        Self {
            entity_id: event.entity_id.clone(),
            count: event.count,
            observed_at,
        }
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::codec::encode(
            &self.entity_id,
            self.count,
            self.observed_at,
        ))
    }
}

/// Absolute time as seconds plus a sub-second fraction
///
/// Same layout as the protobuf well-known `Timestamp`: `nanos` is always
/// non-negative, so instants before the epoch carry negative `seconds` and a
/// positive fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTimestamp {
    /// Whole seconds since the Unix epoch
    pub seconds: i64,
    /// Sub-second fraction in nanoseconds, `[0, 1e9)`
    #[serde(default)]
    pub nanos: i32,
}

impl WireTimestamp {
    /// Validate and convert to nanoseconds since the Unix epoch
    ///
    /// Fails when `nanos` is out of range, `seconds` is outside years
    /// 0001..=9999, or the instant does not fit an `i64` nanosecond count.
    pub fn to_nanos(self) -> Result<i64, String> {
        if !(0..NANOS_PER_SECOND as i32).contains(&self.nanos) {
            return Err(format!("nanos {} out of range [0, 1e9)", self.nanos));
        }
        if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&self.seconds) {
            return Err(format!(
                "seconds {} out of range [{}, {}]",
                self.seconds, MIN_TIMESTAMP_SECONDS, MAX_TIMESTAMP_SECONDS
            ));
        }
        self.seconds
            .checked_mul(NANOS_PER_SECOND)
            .and_then(|ns| ns.checked_add(self.nanos as i64))
            .ok_or_else(|| {
                format!(
                    "timestamp {}.{:09} overflows nanosecond range",
                    self.seconds, self.nanos
                )
            })
    }

    /// Build from nanoseconds since the Unix epoch
    pub fn from_nanos(nanos: i64) -> Self {
        Self {
            seconds: nanos.div_euclid(NANOS_PER_SECOND),
            nanos: nanos.rem_euclid(NANOS_PER_SECOND) as i32,
        }
    }
}

/// Whole-second part of a nanosecond timestamp, rounded toward negative infinity
#[inline]
pub fn unix_seconds(nanos: i64) -> i64 {
    nanos.div_euclid(NANOS_PER_SECOND)
}

/// Source of persist timestamps
///
/// Injected into the ingestion writer so tests can place records at known times.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in nanoseconds since the Unix epoch
    fn now_nanos(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        // None only past year 2262
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(i64::MAX)
    }
}

/// Clock that only moves when told to
///
/// Every call to [`Clock::now_nanos`] returns the current value and then
/// advances it by `step`, so consecutive records never share a timestamp.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicI64,
    step: i64,
}

impl ManualClock {
    /// Start at `start_nanos`, advancing 1ns per reading
    pub fn new(start_nanos: i64) -> Self {
        Self::with_step(start_nanos, 1)
    }

    /// Start at `start_nanos`, advancing `step` ns per reading
    pub fn with_step(start_nanos: i64, step: i64) -> Self {
        Self {
            now: std::sync::atomic::AtomicI64::new(start_nanos),
            step,
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, nanos: i64) {
        self.now.store(nanos, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.now
            .fetch_add(self.step, std::sync::atomic::Ordering::SeqCst)
    }
}
