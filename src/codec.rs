//! Record key codec
//!
//! A [`MetricRecord`] is stored as a flat key so the store never needs to
//! understand its shape:
//!
//! ```text
//! <entity_id>:<count>:<observed_at_ns>
//! ```
//!
//! `count` is a base-10 signed integer, `observed_at_ns` a base-10
//! non-negative integer. Because `observed_at` has nanosecond resolution,
//! two identical observations still encode to different keys.
//!
//! `entity_id` is written as-is. An id containing [`DELIMITER`] produces a key
//! that no longer splits into three fields; callers must not send such ids.
//!
//! # Example
//!
//! ```rust
//! use kuba_counter::codec;
//!
//! let key = codec::encode("8ed5", 3, 1_700_000_000_000_000_000);
//! assert_eq!(key, "8ed5:3:1700000000000000000");
//!
//! let record = codec::decode(&key).unwrap();
//! assert_eq!(record.entity_id, "8ed5");
//! assert_eq!(record.count, 3);
//! ```

use crate::error::RecordError;
use crate::types::MetricRecord;
use std::str::FromStr;

/// Field separator in encoded keys
pub const DELIMITER: char = ':';

/// Number of fields in an encoded key
const FIELD_COUNT: usize = 3;

/// Encode a record's fields into a store key
pub fn encode(entity_id: &str, count: i64, observed_at_ns: i64) -> String {
    format!("{entity_id}{DELIMITER}{count}{DELIMITER}{observed_at_ns}")
}

/// Decode a store key back into a record
///
/// Fails unless the key splits into exactly three fields and both numeric
/// fields parse. The timestamp is not range-checked.
pub fn decode(key: &str) -> Result<MetricRecord, RecordError> {
    let fields: Vec<&str> = key.split(DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(RecordError::FieldCount {
            found: fields.len(),
        });
    }

    let count = fields[1]
        .parse::<i64>()
        .map_err(|_| RecordError::InvalidCount {
            value: fields[1].to_string(),
        })?;

    // u64 first so a leading '-' is rejected, then narrow
    let observed_at = fields[2]
        .parse::<u64>()
        .ok()
        .and_then(|ns| i64::try_from(ns).ok())
        .ok_or_else(|| RecordError::InvalidTimestamp {
            value: fields[2].to_string(),
        })?;

    Ok(MetricRecord {
        entity_id: fields[0].to_string(),
        count,
        observed_at,
    })
}

/// Whether an entity id would break the three-field key layout
pub fn contains_delimiter(entity_id: &str) -> bool {
    entity_id.contains(DELIMITER)
}

impl MetricRecord {
    /// Encode this record into a store key
    pub fn encode(&self) -> String {
        encode(&self.entity_id, self.count, self.observed_at)
    }
}

impl FromStr for MetricRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        assert_eq!(encode("abcd", 6, 15), "abcd:6:15");
        assert_eq!(encode("abcd", -6, 0), "abcd:-6:0");
    }

    #[test]
    fn test_decode_valid() {
        let record = decode("abcd:-12:1700000000123456789").unwrap();
        assert_eq!(record.entity_id, "abcd");
        assert_eq!(record.count, -12);
        assert_eq!(record.observed_at, 1_700_000_000_123_456_789);
    }

    #[test]
    fn test_decode_empty_entity_is_allowed() {
        let record = decode(":1:2").unwrap();
        assert_eq!(record.entity_id, "");
    }

    #[test]
    fn test_decode_field_count() {
        assert_eq!(
            decode("abcd:6").unwrap_err(),
            RecordError::FieldCount { found: 2 }
        );
        assert_eq!(
            decode("a:b:6:15").unwrap_err(),
            RecordError::FieldCount { found: 4 }
        );
        assert_eq!(decode("").unwrap_err(), RecordError::FieldCount { found: 1 });
    }

    #[test]
    fn test_decode_bad_count() {
        assert!(matches!(
            decode("abcd:six:15"),
            Err(RecordError::InvalidCount { .. })
        ));
        assert!(matches!(
            decode("abcd:1.5:15"),
            Err(RecordError::InvalidCount { .. })
        ));
        assert!(matches!(
            decode("abcd:99999999999999999999:15"),
            Err(RecordError::InvalidCount { .. })
        ));
    }

    #[test]
    fn test_decode_bad_timestamp() {
        assert!(matches!(
            decode("abcd:1:-15"),
            Err(RecordError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            decode("abcd:1:"),
            Err(RecordError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            decode("abcd:1:18446744073709551615"),
            Err(RecordError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_delimiter_in_entity_breaks_roundtrip() {
        assert!(contains_delimiter("a:b"));
        let key = encode("a:b", 1, 2);
        assert_eq!(decode(&key).unwrap_err(), RecordError::FieldCount { found: 4 });
    }

    #[test]
    fn test_from_str() {
        let record: MetricRecord = "x:5:10".parse().unwrap();
        assert_eq!(record.encode(), "x:5:10");
    }
}
