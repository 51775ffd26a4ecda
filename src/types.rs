//! Core data types for tag aggregation
//!
//! # Key Types
//!
//! - **`Identifier`**: Opaque byte-comparable handle for a tag name or value
//! - **`IdentifierPool`**: Hands out identifiers and recycles their buffers
//!   when they are released
//! - **`Tag`**: A name/value pair as observed in one partial response
//!
//! # Release Discipline
//!
//! Identifiers checked out of a pool must be handed back with
//! [`Identifier::finalize`]. Since `finalize` consumes the handle, an
//! identifier cannot be read after release. Simply dropping a pooled
//! identifier frees its memory but leaves it counted as outstanding, which
//! makes unreleased handles visible in [`PoolStats`].
//!
//! # Example
//!
//! ```rust
//! use kuba_tag_aggregate::types::{IdentifierPool, Tag};
//!
//! let pool = IdentifierPool::new();
//! let tag = pool.tag("host", "server1");
//! assert_eq!(tag.name, "host");
//! assert_eq!(pool.stats().outstanding, 2);
//!
//! tag.finalize();
//! assert_eq!(pool.stats().outstanding, 0);
//! ```

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Default number of released buffers a pool keeps for reuse
pub const DEFAULT_MAX_FREE_BUFFERS: usize = 1024;

// ============================================================================
// Identifier
// ============================================================================

/// Opaque, byte-comparable handle for a tag name or tag value
///
/// Equality, ordering and hashing only look at the raw bytes. Two
/// identifiers with the same content compare equal whether or not they
/// came from the same pool.
pub struct Identifier {
    bytes: Vec<u8>,
    pool: Option<IdentifierPool>,
}

impl Identifier {
    /// Create an identifier that does not belong to any pool
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            pool: None,
        }
    }

    /// Raw bytes of the identifier
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the identifier has no content
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether this identifier must be handed back to a pool
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    /// Copy the content into a fresh unpooled identifier
    pub fn to_unpooled(&self) -> Identifier {
        Identifier::new(self.bytes.clone())
    }

    /// Release the identifier back to its pool
    ///
    /// Unpooled identifiers are simply dropped. Returns whether a pool
    /// took the buffer back.
    pub fn finalize(self) -> bool {
        match self.pool {
            Some(pool) => {
                pool.release(self.bytes);
                true
            }
            None => false,
        }
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Identifier {}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.as_slice().cmp(other.bytes.as_slice())
    }
}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl Borrow<[u8]> for Identifier {
    fn borrow(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq<[u8]> for Identifier {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::new(s.as_bytes())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::new(s.into_bytes())
    }
}

impl From<&[u8]> for Identifier {
    fn from(bytes: &[u8]) -> Self {
        Identifier::new(bytes)
    }
}

impl From<Vec<u8>> for Identifier {
    fn from(bytes: Vec<u8>) -> Self {
        Identifier::new(bytes)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identifier")
            .field("bytes", &String::from_utf8_lossy(&self.bytes))
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

// ============================================================================
// Identifier Pool
// ============================================================================

#[derive(Debug)]
struct PoolInner {
    /// Released buffers waiting to be reused
    free: Mutex<Vec<Vec<u8>>>,

    /// Upper bound on `free`
    max_free: usize,

    checked_out: AtomicU64,
    released: AtomicU64,
    reused: AtomicU64,
}

/// Pool of identifier buffers with release accounting
///
/// Cloning the pool is cheap; clones share the same buffers and counters.
/// The pool is thread-safe, although a single accumulator is only ever
/// driven from one thread.
#[derive(Debug, Clone)]
pub struct IdentifierPool {
    inner: Arc<PoolInner>,
}

impl IdentifierPool {
    /// Create a new pool
    pub fn new() -> Self {
        Self::with_max_free(DEFAULT_MAX_FREE_BUFFERS)
    }

    /// Create a pool that keeps at most `max_free` released buffers
    pub fn with_max_free(max_free: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                max_free,
                checked_out: AtomicU64::new(0),
                released: AtomicU64::new(0),
                reused: AtomicU64::new(0),
            }),
        }
    }

    /// Check out an identifier holding a copy of `bytes`
    pub fn get(&self, bytes: &[u8]) -> Identifier {
        let mut buf = match self.inner.free.lock().pop() {
            Some(buf) => {
                self.inner.reused.fetch_add(1, AtomicOrdering::Relaxed);
                buf
            }
            None => Vec::with_capacity(bytes.len()),
        };
        buf.extend_from_slice(bytes);

        self.inner.checked_out.fetch_add(1, AtomicOrdering::Relaxed);

        Identifier {
            bytes: buf,
            pool: Some(self.clone()),
        }
    }

    /// Check out an identifier holding a copy of `s`
    pub fn get_str(&self, s: &str) -> Identifier {
        self.get(s.as_bytes())
    }

    /// Check out both halves of a tag
    pub fn tag(&self, name: &str, value: &str) -> Tag {
        Tag::new(self.get_str(name), self.get_str(value))
    }

    fn release(&self, mut bytes: Vec<u8>) {
        self.inner.released.fetch_add(1, AtomicOrdering::Relaxed);

        bytes.clear();
        let mut free = self.inner.free.lock();
        if free.len() < self.inner.max_free {
            free.push(bytes);
        }
    }

    /// Get a snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        let checked_out = self.inner.checked_out.load(AtomicOrdering::Relaxed);
        let released = self.inner.released.load(AtomicOrdering::Relaxed);

        PoolStats {
            checked_out,
            released,
            outstanding: checked_out.saturating_sub(released),
            reused: self.inner.reused.load(AtomicOrdering::Relaxed),
            free_buffers: self.inner.free.lock().len(),
        }
    }
}

impl Default for IdentifierPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of identifier pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Identifiers handed out since the pool was created
    pub checked_out: u64,
    /// Identifiers handed back through `finalize`
    pub released: u64,
    /// Identifiers checked out and not yet released
    pub outstanding: u64,
    /// Checkouts served from a recycled buffer
    pub reused: u64,
    /// Buffers currently waiting for reuse
    pub free_buffers: usize,
}

// ============================================================================
// Tag
// ============================================================================

/// A single tag observation: dimension name and value
#[derive(Debug, PartialEq, Eq)]
pub struct Tag {
    /// Tag name, e.g. `region`
    pub name: Identifier,
    /// Tag value, e.g. `us-east`
    pub value: Identifier,
}

impl Tag {
    /// Create a new tag
    pub fn new(name: impl Into<Identifier>, value: impl Into<Identifier>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Release both halves of the tag
    pub fn finalize(self) {
        self.name.finalize();
        self.value.finalize();
    }
}

impl<N: Into<Identifier>, V: Into<Identifier>> From<(N, V)> for Tag {
    fn from((name, value): (N, V)) -> Self {
        Tag::new(name, value)
    }
}
