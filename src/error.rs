//! Error types for the indexer query engine.

use std::io;
use thiserror::Error;

/// Result type alias for indexer operations.
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Errors that can occur while talking to the indexer.
///
/// All variants except [`IndexerError::Timeout`] are structural: they mean
/// the controller does not speak a supported PILS revision or reports
/// self-descriptions that fail validation, and retrying will not help.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// The magic probe did not match any supported PILS revision.
    #[error("unsupported PILS magic value: {magic}")]
    UnsupportedVersion {
        /// The magic value read from the controller.
        magic: f64,
    },

    /// The indexer offset read from the fixed bootstrap address is invalid.
    #[error("invalid indexer offset {offset}: must be even and >= 6")]
    InvalidOffset {
        /// The offset read from the controller.
        offset: u16,
    },

    /// The indexer size reported by the controller is invalid.
    #[error("invalid indexer size {size}: must be even and within [22, 66]")]
    InvalidSize {
        /// The size reported by the controller.
        size: u16,
    },

    /// Two independent sources of the indexer location disagree.
    ///
    /// The directly queried address/size and the values the indexer reports
    /// about itself in its info struct must match exactly. A mismatch means
    /// the transport or address resolution is unreliable and no further
    /// query results can be trusted.
    #[error(
        "inconsistent bootstrap data: queried addr={queried_addr}/size={queried_size}, \
         info struct reports addr={reported_addr}/size={reported_size}"
    )]
    InconsistentBootstrap {
        /// Address obtained from the fixed bootstrap word.
        queried_addr: u16,
        /// Size obtained from the direct size query.
        queried_size: u16,
        /// Address the indexer reports about itself.
        reported_addr: u16,
        /// Size the indexer reports about itself.
        reported_size: u16,
    },

    /// The transaction engine exhausted its retry budget without a
    /// matching echo.
    #[error("indexer timeout: no matching reply within the retry budget")]
    Timeout,

    /// The register payload was shorter than the decoded layout requires.
    #[error("short payload: expected at least {expected} bytes, got {actual}")]
    ShortPayload {
        /// Minimum number of bytes the layout requires.
        expected: usize,
        /// Number of bytes actually received.
        actual: usize,
    },

    /// I/O error reported by the register transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl IndexerError {
    /// Creates a new `UnsupportedVersion` error.
    pub fn unsupported_version(magic: f64) -> Self {
        Self::UnsupportedVersion { magic }
    }

    /// Creates a new `InvalidOffset` error.
    pub fn invalid_offset(offset: u16) -> Self {
        Self::InvalidOffset { offset }
    }

    /// Creates a new `InvalidSize` error.
    pub fn invalid_size(size: u16) -> Self {
        Self::InvalidSize { size }
    }

    /// Creates a new `ShortPayload` error.
    pub fn short_payload(expected: usize, actual: usize) -> Self {
        Self::ShortPayload { expected, actual }
    }
}
