//! Tag Aggregation Across Partial Query Results
//!
//! A distributed tag query fans out to many shards or hosts. Each partial
//! response reports some tag names and some of their values, usually with
//! heavy overlap. This module merges them into one answer:
//!
//! ```text
//! ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//! │  shard A    │ │  shard B    │ │  shard C    │
//! │ region=us   │ │ region=eu   │ │ env=prod    │
//! └─────────────┘ └─────────────┘ └─────────────┘
//!        └───────────────┼───────────────┘
//!                        ↓  add_tag()
//! ┌─────────────────────────────────────────────┐
//! │              TagAccumulator                 │
//! │  region → [eu, us]      env → [prod]        │
//! └─────────────────────────────────────────────┘
//!                        ↓  into_aggregate_iter()
//! ┌─────────────────────────────────────────────┐
//! │             AggregateIterator               │
//! │  next() / current() / remaining() / err()   │
//! └─────────────────────────────────────────────┘
//!                        ↓  finalize()
//!               identifiers back to pool
//! ```
//!
//! # Key Components
//!
//! - **TagValueSet**: sorted, deduplicated values of one tag name
//! - **TagAccumulator**: value sets in first-seen order of tag names, plus a
//!   name index
//! - **AggregateIterator**: forward-only cursor with a sticky error slot

pub mod accumulator;
pub mod iterator;
pub mod tag_values;

pub use accumulator::{AccumulatorStats, TagAccumulator, Unretained};
pub use iterator::{AggregateIterator, AggregatedTagsIterator, CursorState, TagValues};
pub use tag_values::{ReleaseCounts, TagValueSet};
