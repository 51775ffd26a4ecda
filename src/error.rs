//! Error types for tag aggregation
//!
//! Populating and iterating an accumulator never performs I/O, so the only
//! errors here describe bad input arriving from an upstream partial response
//! or misuse of an already finalized accumulator. They are recorded as the
//! sticky error and surfaced through `err()`.

use std::fmt;

use thiserror::Error;

/// Which half of a tag an identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierField {
    /// The tag name (dimension)
    Name,
    /// The tag value
    Value,
}

impl fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierField::Name => write!(f, "tag name"),
            IdentifierField::Value => write!(f, "tag value"),
        }
    }
}

/// Main error type for tag aggregation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Identifier is empty or otherwise unusable
    #[error("Invalid {field}: {reason}")]
    InvalidIdentifier {
        /// Which half of the tag was rejected
        field: IdentifierField,
        /// Why it was rejected
        reason: String,
    },

    /// Identifier exceeds the configured length limit
    #[error("{field} too long: {actual} bytes (max: {max} bytes)")]
    IdentifierTooLong {
        /// Which half of the tag was rejected
        field: IdentifierField,
        /// Actual length in bytes
        actual: usize,
        /// Configured maximum in bytes
        max: usize,
    },

    /// A tag arrived after the accumulator released its identifiers
    #[error("Tag accumulator already finalized")]
    Finalized,

    /// Inconsistency reported by the component populating the accumulator
    #[error("Upstream inconsistency: {0}")]
    Upstream(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Short label for the `reason` dimension of rejection metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidIdentifier { .. } => "invalid",
            Error::IdentifierTooLong { .. } => "too_long",
            Error::Finalized => "finalized",
            Error::Upstream(_) => "upstream",
            Error::Configuration(_) => "configuration",
        }
    }
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::IdentifierTooLong {
            field: IdentifierField::Name,
            actual: 300,
            max: 256,
        };
        assert_eq!(
            err.to_string(),
            "tag name too long: 300 bytes (max: 256 bytes)"
        );

        let err = Error::InvalidIdentifier {
            field: IdentifierField::Value,
            reason: "empty".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid tag value: empty");
    }

    #[test]
    fn test_error_reason_labels() {
        assert_eq!(Error::Finalized.reason(), "finalized");
        assert_eq!(Error::Upstream("shard 3".into()).reason(), "upstream");
    }
}
