//! Tag accumulator: merges tags from many partial responses
//!
//! A fan-out query receives one response per shard or host, each reporting
//! some tag names with some of their values. The accumulator folds all of
//! them into one value set per tag name:
//!
//! - tag names keep the order in which they were first observed
//! - values of each name are kept sorted in byte order without duplicates
//!
//! # Phases
//!
//! Population happens through `&mut self` on [`TagAccumulator`]. Reading
//! happens through [`AggregateIterator`], which takes the accumulator by
//! value, so tags cannot be added once iteration has begun.
//!
//! # Example
//!
//! ```rust
//! use kuba_tag_aggregate::{Tag, TagAccumulator};
//!
//! let mut acc = TagAccumulator::new();
//! acc.add_tag(Tag::new("region", "us"));
//! acc.add_tag(Tag::new("env", "prod"));
//! acc.add_tag(Tag::new("region", "eu"));
//!
//! let mut iter = acc.into_aggregate_iter();
//! assert!(iter.next());
//! let (name, values) = iter.current().unwrap();
//! assert_eq!(name, "region");
//! assert_eq!(values.map(|v| v.to_string()).collect::<Vec<_>>(), ["eu", "us"]);
//! iter.finalize();
//! ```

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use super::iterator::AggregateIterator;
use super::tag_values::TagValueSet;
use crate::config::AccumulatorConfig;
use crate::error::{Error, IdentifierField, Result};
use crate::metrics;
use crate::types::{Identifier, Tag};

// ============================================================================
// Unretained identifiers
// ============================================================================

/// Identifiers from an added tag that the accumulator did not keep
///
/// The name comes back when the tag name was already known, the value when
/// a byte-equal value was already present. Dropping this leaves them
/// unreleased; call [`Unretained::finalize`] to hand them back to a pool.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Unretained {
    /// Surplus copy of an already known tag name
    pub name: Option<Identifier>,
    /// Value dropped as a duplicate
    pub value: Option<Identifier>,
}

impl Unretained {
    /// Check if the accumulator kept both halves of the tag
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.value.is_none()
    }

    /// Whether the value was dropped as a duplicate
    pub fn is_duplicate(&self) -> bool {
        self.value.is_some()
    }

    /// Release whatever the accumulator did not keep
    pub fn finalize(self) {
        if let Some(name) = self.name {
            name.finalize();
        }
        if let Some(value) = self.value {
            value.finalize();
        }
    }
}

// ============================================================================
// Accumulator Statistics
// ============================================================================

/// Statistics about an accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccumulatorStats {
    /// Number of distinct tag names
    pub tag_count: usize,

    /// Total number of distinct values across all tag names
    pub total_value_count: usize,

    /// Maximum number of values for any single tag name
    pub max_values_per_tag: usize,

    /// Tags passed to `add_tag`/`try_add_tag`
    pub tags_observed: u64,

    /// Values dropped because the tag already held them
    pub duplicates_dropped: u64,

    /// Tags rejected by validation
    pub tags_rejected: u64,
}

// ============================================================================
// Tag Accumulator
// ============================================================================

/// Ordered collection of per-tag-name value sets
#[derive(Debug)]
pub struct TagAccumulator {
    /// Value sets in first-seen order of their tag names
    pub(super) order: Vec<TagValueSet>,

    /// Tag name bytes -> slot in `order`
    index: HashMap<Vec<u8>, usize>,

    config: AccumulatorConfig,

    /// Sticky error, first one wins
    pub(super) err: Option<Error>,

    finalized: bool,

    tags_observed: u64,
    duplicates_dropped: u64,
    tags_rejected: u64,
}

impl TagAccumulator {
    /// Create an empty accumulator with default configuration
    pub fn new() -> Self {
        Self::with_config(AccumulatorConfig::default())
    }

    /// Create an empty accumulator with the given configuration
    ///
    /// The configuration is validated here. An invalid one becomes the
    /// sticky error, so every `try_add_tag` fails with it and iteration
    /// yields nothing.
    pub fn with_config(config: AccumulatorConfig) -> Self {
        let err = config.validate().err();
        if let Some(err) = &err {
            warn!("Tag accumulator created with invalid config: {}", err);
        }

        Self {
            order: Vec::with_capacity(config.initial_tag_capacity),
            index: HashMap::with_capacity(config.initial_tag_capacity),
            config,
            err,
            finalized: false,
            tags_observed: 0,
            duplicates_dropped: 0,
            tags_rejected: 0,
        }
    }

    /// Add one tag observation
    ///
    /// An unseen tag name gets a new, empty value set appended after all
    /// known names. The value is then merged into that name's sorted values,
    /// leaving every other tag name untouched.
    ///
    /// Input is not validated; use [`try_add_tag`](Self::try_add_tag) for
    /// tags arriving from an untrusted partial response.
    pub fn add_tag(&mut self, tag: Tag) -> Unretained {
        if self.finalized {
            warn!("Tag {}={} added after finalize", tag.name, tag.value);
            self.record_error(Error::Finalized);
            return Unretained {
                name: Some(tag.name),
                value: Some(tag.value),
            };
        }

        self.tags_observed += 1;
        metrics::record_observed();

        let Tag { name, value } = tag;
        let known = self.index.get(name.as_bytes()).copied();
        let (slot, surplus_name) = match known {
            Some(slot) => (slot, Some(name)),
            None => {
                trace!("New tag name: {}", name);
                let slot = self.order.len();
                self.index.insert(name.as_bytes().to_vec(), slot);
                self.order.push(TagValueSet::with_capacity(
                    name,
                    self.config.initial_value_capacity,
                ));
                (slot, None)
            }
        };

        let duplicate = self.order[slot].insert(value);
        if duplicate.is_some() {
            self.duplicates_dropped += 1;
            metrics::record_duplicate();
        }

        Unretained {
            name: surplus_name,
            value: duplicate,
        }
    }

    /// Validate and add one tag observation
    ///
    /// An empty or oversized identifier is treated as an inconsistency in
    /// the upstream response: the error becomes the sticky error, the
    /// rejected tag is released, and iteration will yield nothing. Once a
    /// sticky error is set every further call fails with it.
    pub fn try_add_tag(&mut self, tag: Tag) -> Result<Unretained> {
        if let Some(err) = &self.err {
            let err = err.clone();
            tag.finalize();
            return Err(err);
        }
        if self.finalized {
            tag.finalize();
            self.record_error(Error::Finalized);
            return Err(Error::Finalized);
        }

        if let Err(err) = self.validate(&tag) {
            warn!("Rejected tag {}={}: {}", tag.name, tag.value, err);
            self.tags_rejected += 1;
            metrics::record_rejected(err.reason());
            tag.finalize();
            self.record_error(err.clone());
            return Err(err);
        }

        Ok(self.add_tag(tag))
    }

    fn validate(&self, tag: &Tag) -> Result<()> {
        if tag.name.is_empty() {
            return Err(Error::InvalidIdentifier {
                field: IdentifierField::Name,
                reason: "empty identifier".to_string(),
            });
        }
        if tag.name.len() > self.config.max_tag_name_length {
            return Err(Error::IdentifierTooLong {
                field: IdentifierField::Name,
                actual: tag.name.len(),
                max: self.config.max_tag_name_length,
            });
        }
        if tag.value.is_empty() && self.config.reject_empty_values {
            return Err(Error::InvalidIdentifier {
                field: IdentifierField::Value,
                reason: "empty identifier".to_string(),
            });
        }
        if tag.value.len() > self.config.max_tag_value_length {
            return Err(Error::IdentifierTooLong {
                field: IdentifierField::Value,
                actual: tag.value.len(),
                max: self.config.max_tag_value_length,
            });
        }
        Ok(())
    }

    /// Add every tag of a partial response
    ///
    /// Repeated tag names are released as they arrive. Values dropped as
    /// duplicates are not released.
    pub fn add_tags<I>(&mut self, tags: I)
    where
        I: IntoIterator<Item = Tag>,
    {
        for tag in tags {
            if let Some(name) = self.add_tag(tag).name {
                name.finalize();
            }
        }
    }

    /// Record an inconsistency detected by the population source
    ///
    /// Only the first error is kept.
    pub fn record_error(&mut self, err: Error) {
        if self.err.is_none() {
            debug!("Tag accumulator errored: {}", err);
            self.err = Some(err);
        }
    }

    /// Sticky error, if any
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Number of distinct tag names
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if no tag has been added
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether `finalize` has run
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Total number of distinct values across all tag names
    pub fn value_count(&self) -> usize {
        self.order.iter().map(TagValueSet::len).sum()
    }

    /// Value set for a tag name
    pub fn get(&self, name: &[u8]) -> Option<&TagValueSet> {
        self.index.get(name).and_then(|&slot| self.order.get(slot))
    }

    /// Tag names in first-seen order
    pub fn tag_names(&self) -> impl Iterator<Item = &Identifier> + '_ {
        self.order.iter().map(TagValueSet::name)
    }

    /// Value sets in first-seen order of their names
    pub fn iter(&self) -> std::slice::Iter<'_, TagValueSet> {
        self.order.iter()
    }

    /// Get statistics about the accumulator
    pub fn stats(&self) -> AccumulatorStats {
        AccumulatorStats {
            tag_count: self.order.len(),
            total_value_count: self.value_count(),
            max_values_per_tag: self.order.iter().map(TagValueSet::len).max().unwrap_or(0),
            tags_observed: self.tags_observed,
            duplicates_dropped: self.duplicates_dropped,
            tags_rejected: self.tags_rejected,
        }
    }

    /// Switch to the iteration phase
    pub fn into_aggregate_iter(self) -> AggregateIterator {
        AggregateIterator::new(self)
    }

    /// Hand every value set to the caller, who becomes responsible for
    /// releasing them
    pub fn into_tags(mut self) -> Vec<TagValueSet> {
        self.index.clear();
        std::mem::take(&mut self.order)
    }

    /// Release every tag name and value, then clear
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        let tag_count = self.order.len();
        let mut value_count = 0;
        let mut pooled = 0;
        for set in self.order.drain(..) {
            let counts = set.finalize();
            metrics::record_released(counts.values, counts.pooled);
            value_count += counts.values;
            pooled += counts.pooled;
        }
        self.index.clear();

        debug!(
            "Finalized tag accumulator: {} tag names, {} values, {} pooled identifiers released",
            tag_count, value_count, pooled
        );
    }

    #[cfg(test)]
    pub(super) fn assert_consistent(&self) {
        assert_eq!(self.order.len(), self.index.len());
        for (slot, set) in self.order.iter().enumerate() {
            assert_eq!(self.index.get(set.name().as_bytes()), Some(&slot));
            assert!(set.values().windows(2).all(|w| w[0] < w[1]));
        }
    }
}

impl Default for TagAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<Tag> for TagAccumulator {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, tags: I) {
        self.add_tags(tags);
    }
}

impl FromIterator<Tag> for TagAccumulator {
    fn from_iter<I: IntoIterator<Item = Tag>>(tags: I) -> Self {
        let mut acc = Self::new();
        acc.add_tags(tags);
        acc
    }
}
