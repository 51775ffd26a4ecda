//! Sorted, deduplicated value set for a single tag name
//!
//! Partial responses from different shards usually report overlapping and
//! already sorted values, and the number of distinct values per tag stays
//! small. A linear merge into a reusable scratch buffer keeps each insertion
//! O(k) without re-sorting.

use std::cmp::Ordering;
use std::mem;

use crate::types::Identifier;

/// All distinct values observed for one tag name
///
/// `values` is strictly increasing in byte order after every insertion.
#[derive(Debug)]
pub struct TagValueSet {
    name: Identifier,
    values: Vec<Identifier>,

    /// Merge target, swapped with `values` after each merge
    scratch: Vec<Identifier>,
}

impl TagValueSet {
    /// Create an empty value set for `name`
    pub fn new(name: Identifier) -> Self {
        Self::with_capacity(name, 0)
    }

    /// Create an empty value set with room for `capacity` values
    pub fn with_capacity(name: Identifier, capacity: usize) -> Self {
        Self {
            name,
            values: Vec::with_capacity(capacity),
            scratch: Vec::new(),
        }
    }

    /// Tag name
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    /// Values in ascending byte order
    pub fn values(&self) -> &[Identifier] {
        &self.values
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no value has been inserted yet
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check if a value with the same bytes is present
    pub fn contains(&self, value: &[u8]) -> bool {
        self.values
            .binary_search_by(|v| v.as_bytes().cmp(value))
            .is_ok()
    }

    /// Iterate values in ascending byte order
    pub fn iter(&self) -> std::slice::Iter<'_, Identifier> {
        self.values.iter()
    }

    /// Merge `value` into the sorted values
    ///
    /// Returns the incoming identifier if a byte-equal value is already
    /// present; the existing one is kept and the returned duplicate is not
    /// released.
    pub fn insert(&mut self, value: Identifier) -> Option<Identifier> {
        if self.values.is_empty() {
            self.values.push(value);
            return None;
        }

        self.scratch.clear();
        self.scratch.reserve(self.values.len() + 1);

        let mut existing = self.values.drain(..);
        let mut incoming = value;
        let duplicate = loop {
            let Some(current) = existing.next() else {
                // larger than everything present
                self.scratch.push(incoming);
                break None;
            };

            match incoming.cmp(&current) {
                Ordering::Greater => self.scratch.push(current),
                Ordering::Equal => {
                    self.scratch.push(current);
                    break Some(incoming);
                }
                Ordering::Less => {
                    self.scratch.push(incoming);
                    self.scratch.push(current);
                    break None;
                }
            }
        };
        self.scratch.extend(existing);

        mem::swap(&mut self.values, &mut self.scratch);
        duplicate
    }

    /// Release the name and every value back to their pools
    pub fn finalize(self) -> ReleaseCounts {
        let mut counts = ReleaseCounts {
            values: self.values.len(),
            pooled: 0,
        };
        if self.name.finalize() {
            counts.pooled += 1;
        }
        for value in self.values {
            if value.finalize() {
                counts.pooled += 1;
            }
        }
        counts
    }

    /// Split into the name and the sorted values
    pub fn into_parts(self) -> (Identifier, Vec<Identifier>) {
        (self.name, self.values)
    }
}

/// What tearing down one [`TagValueSet`] handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReleaseCounts {
    /// Distinct values the set held
    pub values: usize,

    /// Identifiers, name included, returned to a pool
    pub pooled: usize,
}

impl<'a> IntoIterator for &'a TagValueSet {
    type Item = &'a Identifier;
    type IntoIter = std::slice::Iter<'a, Identifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
