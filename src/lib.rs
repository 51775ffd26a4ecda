//! Kuba Tag Aggregate - merging tag values from fan-out query results
//!
//! This library provides the tag half of a distributed time-series query:
//! - Merges tag observations from per-shard partial responses
//! - Sorted, deduplicated values per tag name in byte order
//! - Tag names reported in first-seen order
//! - Forward-only iteration with explicit release of pooled identifiers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Prometheus metrics for tag aggregation
pub mod metrics;

/// Tag accumulator, value sets and the aggregate iterator
pub mod aggregation;

// Re-export main types
pub use aggregation::{AggregateIterator, AggregatedTagsIterator, TagAccumulator, TagValueSet};
pub use config::AccumulatorConfig;
pub use error::{Error, Result};
pub use types::{Identifier, IdentifierPool, Tag};
