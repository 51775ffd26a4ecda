//! Property tests for tag aggregation
//!
//! Uses property-based testing (proptest) to check the accumulator
//! invariants over arbitrary tag streams.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use kuba_tag_aggregate::{IdentifierPool, Tag, TagAccumulator};

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Strategy for tag names drawn from a small alphabet so names repeat
fn tag_name() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(b"region".to_vec()),
        Just(b"env".to_vec()),
        Just(b"host".to_vec()),
        prop::collection::vec(b'a'..=b'e', 1..3),
    ]
}

/// Strategy for tag values, including non-UTF-8 bytes and shared prefixes
fn tag_value() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => prop::collection::vec(b'a'..=b'f', 1..4),
        1 => prop::collection::vec(any::<u8>(), 1..6),
    ]
}

fn tag_stream(max_len: usize) -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    prop::collection::vec((tag_name(), tag_value()), 0..max_len)
}

fn populate(stream: &[(Vec<u8>, Vec<u8>)]) -> TagAccumulator {
    stream
        .iter()
        .map(|(n, v)| Tag::new(n.clone(), v.clone()))
        .collect()
}

/// Expected result computed with ordered std collections
fn model(stream: &[(Vec<u8>, Vec<u8>)]) -> Vec<(Vec<u8>, Vec<Vec<u8>>)> {
    let mut order: Vec<Vec<u8>> = Vec::new();
    let mut sets: HashMap<Vec<u8>, BTreeSet<Vec<u8>>> = HashMap::new();
    for (n, v) in stream {
        if !sets.contains_key(n) {
            order.push(n.clone());
        }
        sets.entry(n.clone()).or_default().insert(v.clone());
    }
    order
        .into_iter()
        .map(|n| {
            let values = sets.remove(&n).unwrap_or_default().into_iter().collect();
            (n, values)
        })
        .collect()
}

fn read_out(acc: TagAccumulator) -> Vec<(Vec<u8>, Vec<Vec<u8>>)> {
    let mut iter = acc.into_aggregate_iter();
    let mut out = Vec::new();
    while iter.next() {
        let (name, values) = iter.current().unwrap();
        out.push((
            name.as_bytes().to_vec(),
            values.map(|v| v.as_bytes().to_vec()).collect(),
        ));
    }
    iter.finalize();
    out
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Every value set is strictly increasing after any sequence of inserts
    #[test]
    fn values_strictly_increasing(stream in tag_stream(200)) {
        let acc = populate(&stream);
        for set in acc.iter() {
            for pair in set.values().windows(2) {
                prop_assert!(pair[0].as_bytes() < pair[1].as_bytes());
            }
        }
    }

    /// Output matches a BTreeSet model with first-seen name order
    #[test]
    fn matches_ordered_set_model(stream in tag_stream(200)) {
        let expected = model(&stream);
        let actual = read_out(populate(&stream));
        prop_assert_eq!(actual, expected);
    }

    /// Adding the same tag twice keeps one value
    #[test]
    fn duplicate_insert_is_idempotent(name in tag_name(), value in tag_value()) {
        let mut acc = TagAccumulator::new();
        acc.add_tag(Tag::new(name.clone(), value.clone()));
        let unretained = acc.add_tag(Tag::new(name.clone(), value));
        prop_assert!(unretained.is_duplicate());
        prop_assert_eq!(acc.get(&name).map(|s| s.len()), Some(1));
    }

    /// Value order does not depend on the order values arrive in
    #[test]
    fn insertion_order_independent(
        values in prop::collection::vec(tag_value(), 1..30).prop_shuffle()
    ) {
        let mut forward = TagAccumulator::new();
        let mut reverse = TagAccumulator::new();
        for v in &values {
            forward.add_tag(Tag::new("k", v.clone()));
        }
        for v in values.iter().rev() {
            reverse.add_tag(Tag::new("k", v.clone()));
        }
        prop_assert_eq!(read_out(forward), read_out(reverse));
    }

    /// remaining() counts down by one per successful next()
    #[test]
    fn remaining_accounting(stream in tag_stream(100)) {
        let acc = populate(&stream);
        let total = acc.len();
        let mut iter = acc.into_aggregate_iter();
        prop_assert_eq!(iter.remaining(), total);

        let mut advanced = 0;
        while iter.next() {
            advanced += 1;
            prop_assert_eq!(iter.remaining(), total - advanced);
        }
        prop_assert_eq!(advanced, total);
        prop_assert_eq!(iter.remaining(), 0);
        prop_assert!(!iter.next());
    }

    /// Finalize returns every identifier the accumulator kept
    #[test]
    fn finalize_releases_retained(stream in tag_stream(100)) {
        let pool = IdentifierPool::new();
        let mut acc = TagAccumulator::new();
        for (n, v) in &stream {
            acc.add_tag(Tag::new(pool.get(n), pool.get(v))).finalize();
        }

        let mut iter = acc.into_aggregate_iter();
        iter.finalize();

        let stats = pool.stats();
        prop_assert_eq!(stats.checked_out, 2 * stream.len() as u64);
        prop_assert_eq!(stats.outstanding, 0);
    }
}
