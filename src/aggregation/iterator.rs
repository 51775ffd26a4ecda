//! Forward-only cursor over accumulated tags
//!
//! [`AggregatedTagsIterator`] is the contract a query-response serializer
//! consumes: advance with `next`, read the positioned tag with `current`,
//! and call `finalize` once done so pooled identifiers go back to their
//! pool.
//!
//! # States
//!
//! ```text
//!  NotStarted ──next()──▶ Positioned(0) ──next()──▶ ... ──next()──▶ Exhausted
//!       │                                                              ▲
//!       └──────────────── finalize() / sticky error ──────────────────┘
//! ```
//!
//! A sticky error recorded during population stops the machine before it
//! yields anything.

use tracing::debug;

use super::accumulator::TagAccumulator;
use crate::error::Error;
use crate::types::Identifier;

/// Iteration contract for merged tag results
///
/// Mirrors the interface the fan-out query layer expects from any tag
/// aggregation source.
pub trait AggregatedTagsIterator {
    /// Advance to the next tag name
    ///
    /// Returns `false` once exhausted or errored, and keeps returning
    /// `false` after that.
    fn next(&mut self) -> bool;

    /// Tag name and values at the current position
    ///
    /// `None` unless the last call to `next` returned `true`.
    fn current(&self) -> Option<(&Identifier, TagValues<'_>)>;

    /// Number of tag names not yet visited
    fn remaining(&self) -> usize;

    /// Sticky error, if any
    fn err(&self) -> Option<&Error>;

    /// Release every owned identifier; the iterator yields nothing afterwards
    fn finalize(&mut self);
}

/// Forward-only iterator over one tag's sorted values
#[derive(Debug, Clone)]
pub struct TagValues<'a> {
    inner: std::slice::Iter<'a, Identifier>,
}

impl<'a> TagValues<'a> {
    fn new(values: &'a [Identifier]) -> Self {
        Self {
            inner: values.iter(),
        }
    }
}

impl<'a> Iterator for TagValues<'a> {
    type Item = &'a Identifier;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for TagValues<'_> {}

impl std::iter::FusedIterator for TagValues<'_> {}

/// Cursor position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// `next` has not been called yet
    NotStarted,
    /// Positioned on the tag name at this index
    Positioned(usize),
    /// Moved past the last tag name, or finalized
    Exhausted,
}

/// Cursor over a populated [`TagAccumulator`]
#[derive(Debug)]
pub struct AggregateIterator {
    tags: TagAccumulator,
    state: CursorState,

    /// Index of the loaded view; cleared before every advance
    current: Option<usize>,
}

impl AggregateIterator {
    /// Start iterating a fully populated accumulator
    pub fn new(tags: TagAccumulator) -> Self {
        Self {
            tags,
            state: CursorState::NotStarted,
            current: None,
        }
    }

    /// Current cursor state
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Total number of tag names, visited or not
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Check if there are no tag names at all
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Underlying accumulator, for statistics
    pub fn accumulator(&self) -> &TagAccumulator {
        &self.tags
    }

    /// Advance to the next tag name
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.tags.err.is_some() || self.state == CursorState::Exhausted {
            return false;
        }

        self.release();

        let next = match self.state {
            CursorState::NotStarted => 0,
            CursorState::Positioned(idx) => idx + 1,
            CursorState::Exhausted => return false,
        };

        if next >= self.tags.order.len() {
            self.state = CursorState::Exhausted;
            return false;
        }

        self.state = CursorState::Positioned(next);
        self.current = Some(next);
        true
    }

    /// Tag name and a fresh iterator over its values
    pub fn current(&self) -> Option<(&Identifier, TagValues<'_>)> {
        let set = self.tags.order.get(self.current?)?;
        Some((set.name(), TagValues::new(set.values())))
    }

    /// Number of tag names not yet visited
    pub fn remaining(&self) -> usize {
        let len = self.tags.order.len();
        match self.state {
            CursorState::NotStarted => len,
            CursorState::Positioned(idx) => len.saturating_sub(idx + 1),
            CursorState::Exhausted => 0,
        }
    }

    /// Sticky error, if any
    pub fn err(&self) -> Option<&Error> {
        self.tags.err()
    }

    /// Release every tag name and value back to their pools
    ///
    /// Safe to call more than once.
    pub fn finalize(&mut self) {
        self.release();
        if !self.tags.is_finalized() {
            debug!(
                "Finalizing tag iterator with {} of {} tag names unvisited",
                self.remaining(),
                self.tags.len()
            );
        }
        self.tags.finalize();
        self.state = CursorState::Exhausted;
    }

    /// Drop the transient view of the current tag
    fn release(&mut self) {
        self.current = None;
    }
}

impl From<TagAccumulator> for AggregateIterator {
    fn from(tags: TagAccumulator) -> Self {
        Self::new(tags)
    }
}

impl AggregatedTagsIterator for AggregateIterator {
    fn next(&mut self) -> bool {
        AggregateIterator::next(self)
    }

    fn current(&self) -> Option<(&Identifier, TagValues<'_>)> {
        AggregateIterator::current(self)
    }

    fn remaining(&self) -> usize {
        AggregateIterator::remaining(self)
    }

    fn err(&self) -> Option<&Error> {
        AggregateIterator::err(self)
    }

    fn finalize(&mut self) {
        AggregateIterator::finalize(self)
    }
}

// AggregateIterator must satisfy the query layer's contract, including as a
// trait object.
const _: () = {
    fn assert_impl<T: AggregatedTagsIterator>() {}
    fn assert_object_safe(_: &dyn AggregatedTagsIterator) {}
    let _ = assert_impl::<AggregateIterator>;
    let _ = assert_object_safe;
};
