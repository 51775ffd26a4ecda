//! Metrics for tag aggregation
//!
//! Prometheus counters describing how many tags flow through accumulators,
//! how many are dropped as duplicates or rejected, and how many pooled
//! identifiers are handed back on finalize.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Tags passed to an accumulator
    pub static ref TAGS_OBSERVED_TOTAL: IntCounter = register_int_counter!(
        "tagagg_tags_observed_total",
        "Tags observed across partial responses"
    ).unwrap();

    /// Values dropped because the tag already held byte-identical content
    pub static ref DUPLICATE_VALUES_TOTAL: IntCounter = register_int_counter!(
        "tagagg_duplicate_values_total",
        "Tag values dropped as duplicates during merge-insert"
    ).unwrap();

    /// Tags rejected by validation, labelled by reason
    pub static ref REJECTED_TAGS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tagagg_rejected_tags_total",
        "Tags rejected before reaching a value set",
        &["reason"]
    ).unwrap();

    /// Pooled identifiers released by finalize
    pub static ref IDENTIFIERS_RELEASED_TOTAL: IntCounter = register_int_counter!(
        "tagagg_identifiers_released_total",
        "Pooled identifiers returned to their pool when an accumulator is finalized"
    ).unwrap();

    /// Distinct values held per tag name at finalize
    pub static ref VALUES_PER_TAG: Histogram = register_histogram!(
        "tagagg_values_per_tag",
        "Distinct values per tag name at finalize",
        vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0, 1024.0]
    ).unwrap();
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record a tag entering an accumulator
pub fn record_observed() {
    TAGS_OBSERVED_TOTAL.inc();
}

/// Record a value dropped as a duplicate
pub fn record_duplicate() {
    DUPLICATE_VALUES_TOTAL.inc();
}

/// Record a rejected tag
pub fn record_rejected(reason: &str) {
    REJECTED_TAGS_TOTAL.with_label_values(&[reason]).inc();
}

/// Record the teardown of one tag's value set
///
/// Only identifiers that went back to a pool count as released; unpooled
/// ones are plain drops.
pub fn record_released(value_count: usize, pooled: usize) {
    IDENTIFIERS_RELEASED_TOTAL.inc_by(pooled as u64);
    VALUES_PER_TAG.observe(value_count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = DUPLICATE_VALUES_TOTAL.get();
        record_duplicate();
        assert!(DUPLICATE_VALUES_TOTAL.get() > before);

        let rejected = REJECTED_TAGS_TOTAL.with_label_values(&["invalid"]).get();
        record_rejected("invalid");
        assert!(REJECTED_TAGS_TOTAL.with_label_values(&["invalid"]).get() > rejected);
    }

    #[test]
    fn test_released_counts_pooled_only() {
        let before = IDENTIFIERS_RELEASED_TOTAL.get();
        record_released(5, 2);
        // other tests may finalize pooled sets concurrently
        assert!(IDENTIFIERS_RELEASED_TOTAL.get() >= before + 2);

        let samples = VALUES_PER_TAG.get_sample_count();
        record_released(3, 0);
        assert!(VALUES_PER_TAG.get_sample_count() > samples);
    }

    #[test]
    fn test_gather_metrics() {
        record_observed();
        let text = gather_metrics().unwrap();
        assert!(text.contains("tagagg_tags_observed_total"));
    }
}
