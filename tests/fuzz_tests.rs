//! Fuzz Tests for the Record Codec and Bucket Tiling
//!
//! Uses property-based testing (proptest) to check key encoding, decoding of
//! arbitrary strings, and the bucket bounds arithmetic.

use kuba_counter::codec::{self, DELIMITER};
use kuba_counter::query::bucket_bounds;
use kuba_counter::types::NANOS_PER_SECOND;
use kuba_counter::RecordError;
use proptest::prelude::*;

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Entity ids without the key delimiter
fn entity_id() -> impl Strategy<Value = String> {
    prop_oneof![
        // Hex-like uids
        "[0-9a-f]{1,32}",
        // Arbitrary unicode without ':'
        "[^:]{0,64}",
    ]
}

/// Non-negative nanosecond timestamps
fn observed_at() -> impl Strategy<Value = i64> {
    prop_oneof![
        Just(0i64),
        0i64..i64::MAX,
        // Present-day instants
        1_600_000_000_000_000_000i64..1_900_000_000_000_000_000,
    ]
}

// =============================================================================
// Codec
// =============================================================================

mod codec_roundtrip {
    use super::*;

    proptest! {
        /// decode(encode(x)) == x for delimiter-free ids
        #[test]
        fn roundtrip_preserves_fields(
            entity in entity_id(),
            count in any::<i64>(),
            ts in observed_at(),
        ) {
            let key = codec::encode(&entity, count, ts);
            let record = codec::decode(&key).unwrap();

            prop_assert_eq!(record.entity_id, entity);
            prop_assert_eq!(record.count, count);
            prop_assert_eq!(record.observed_at, ts);
        }

        /// Decoding arbitrary input never panics
        #[test]
        fn decode_arbitrary_does_not_panic(input in ".{0,128}") {
            let _ = codec::decode(&input);
        }

        /// Anything not splitting into three fields is rejected
        #[test]
        fn wrong_field_count_rejected(
            fields in prop::collection::vec("[^:]{0,8}", 1..8)
                .prop_filter("three fields is the valid layout", |f| f.len() != 3)
        ) {
            let key = fields.join(DELIMITER.to_string().as_str());
            prop_assert_eq!(
                codec::decode(&key).unwrap_err(),
                RecordError::FieldCount { found: fields.len() }
            );
        }

        /// A non-numeric count is rejected
        #[test]
        fn non_numeric_count_rejected(
            entity in entity_id(),
            count in "[a-zA-Z_.]{1,8}",
            ts in observed_at(),
        ) {
            let key = format!("{entity}:{count}:{ts}");
            let is_invalid_count = matches!(
                codec::decode(&key),
                Err(RecordError::InvalidCount { .. })
            );
            prop_assert!(is_invalid_count);
        }
    }
}

// =============================================================================
// Bucket Tiling
// =============================================================================

mod tiling {
    use super::*;

    /// Bucket starts from a direct walk: advance `begin` by whole slots while
    /// its whole second is before the end's whole second
    fn walked_starts(from: i64, to: i64, slot: i64) -> Vec<i64> {
        let to_s = to.div_euclid(NANOS_PER_SECOND);
        let mut starts = Vec::new();
        let mut begin = from;
        while begin.div_euclid(NANOS_PER_SECOND) < to_s {
            starts.push(begin);
            begin += slot * NANOS_PER_SECOND;
        }
        starts
    }

    proptest! {
        /// Bounds match the walk, are contiguous and equal width, and the
        /// last one reaches the end's whole second
        #[test]
        fn buckets_match_walk(
            from_s in -1_000_000i64..1_000_000,
            span in 0i64..100_000,
            from_sub_ns in 0i64..NANOS_PER_SECOND,
            to_sub_ns in 0i64..NANOS_PER_SECOND,
            slot in 1i64..10_000,
        ) {
            let from = from_s * NANOS_PER_SECOND + from_sub_ns;
            let to = (from_s + span) * NANOS_PER_SECOND + to_sub_ns;
            let bounds: Vec<_> = bucket_bounds(from, to, slot).unwrap().collect();

            let starts: Vec<i64> = bounds.iter().map(|(b, _)| *b).collect();
            prop_assert_eq!(starts, walked_starts(from, to, slot));

            for (b, e) in &bounds {
                prop_assert_eq!(e - b, slot * NANOS_PER_SECOND);
            }
            for pair in bounds.windows(2) {
                prop_assert_eq!(pair[0].1, pair[1].0);
            }
            if let Some((_, last_end)) = bounds.last() {
                prop_assert!(last_end.div_euclid(NANOS_PER_SECOND) >= from_s + span);
            }
        }
    }
}
