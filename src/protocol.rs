//! Protocol constants, request encoding and version negotiation.
//!
//! This module defines the wire-level vocabulary of the indexer protocol:
//! the supported PILS revisions, the info-type codes that select which
//! metadata field a request queries, and the 16-bit request/reply word
//! format.
//!
//! # Request/Reply Words
//!
//! The indexer register carries no framing, tokens or sequence numbers.
//! A request is a single word:
//!
//! | Bits | Field | Description |
//! |------|-------|-------------|
//! | 15..8 | info type | Which metadata field is queried |
//! | 7..0 | device number | Logical device, 0 = the indexer itself |
//!
//! The controller answers by echoing the request word with bit 15 set.
//! Correlating a reply to its request therefore works purely by value
//! matching, which is what makes the register safe to share between
//! independent clients.
//!
//! # Example
//!
//! ```
//! use pils_indexer::{InfoType, Request};
//!
//! let request = Request::new(3, InfoType::Name);
//! assert_eq!(request.to_word(), 0x0403);
//! assert!(request.matches_reply(0x8403));
//! assert!(!request.matches_reply(0x0403)); // own echo, not yet answered
//! ```

use crate::error::{IndexerError, Result};

/// Byte address of the fixed bootstrap word holding the indexer's own
/// base address.
pub const INDEXER_OFFSET_ADDR: u16 = 4;

/// Reply bit: a valid reply equals the request word with this bit set.
pub const REPLY_BIT: u16 = 0x8000;

/// Mask selecting the low 15 bits used to recognize our own request in
/// the register, answered or not.
pub const REQUEST_MASK: u16 = 0x7FFF;

/// Magic value identifying PILS revision 2015_02.
const MAGIC_2015_02: f64 = 2015.02;

/// Tolerance for magic comparison; the magic travels as a binary32.
const MAGIC_TOLERANCE: f64 = 1e-3;

/// Supported PILS protocol revisions.
///
/// The revision is identified by a magic value read from a fixed bus
/// address before any structural assumption is made about the data area.
/// Unsupported magics abort the bootstrap before any further register
/// traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// PILS revision 2015_02, magic value 2015.02.
    V2015_02,
}

impl ProtocolVersion {
    /// Matches a probed magic value against the supported revisions.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::UnsupportedVersion` if the magic is not a
    /// member of the supported set.
    ///
    /// # Example
    ///
    /// ```
    /// use pils_indexer::ProtocolVersion;
    ///
    /// let version = ProtocolVersion::from_magic(2015.02).unwrap();
    /// assert_eq!(version, ProtocolVersion::V2015_02);
    /// assert!(ProtocolVersion::from_magic(1999.1).is_err());
    /// ```
    pub fn from_magic(magic: f64) -> Result<Self> {
        if (magic - MAGIC_2015_02).abs() < MAGIC_TOLERANCE {
            Ok(ProtocolVersion::V2015_02)
        } else {
            Err(IndexerError::unsupported_version(magic))
        }
    }

    /// Returns the magic value of this revision.
    pub fn magic(self) -> f64 {
        match self {
            ProtocolVersion::V2015_02 => MAGIC_2015_02,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolVersion::V2015_02 => write!(f, "2015_02"),
        }
    }
}

/// Metadata field selectors, packed into the high byte of a request word.
///
/// The numeric codes are defined by PILS revision 2015_02. Each variant
/// implies a fixed decode layout, matched exhaustively by the query
/// methods; there is no per-call format descriptor that could go out of
/// sync with the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoType {
    /// Composite info struct (typecode, size, address, unit, flags,
    /// limits, name).
    Struct,
    /// Device size in bytes.
    Size,
    /// Device byte address in the data area.
    Addr,
    /// Unit code and scale exponent of the main value.
    Unit,
    /// Device name string.
    Name,
    /// Firmware version string (indexer only).
    Version,
    /// First firmware author field (indexer only).
    Author1,
    /// Second firmware author field (indexer only).
    Author2,
    /// Parameter/function indices, as a byte list or bitmap depending on
    /// the device class.
    Params,
    /// Label of the n-th freely definable status bit, n in 0..24.
    Aux(u8),
}

impl InfoType {
    /// Returns the protocol code of this info type.
    pub fn code(self) -> u8 {
        match self {
            InfoType::Struct => 0,
            InfoType::Size => 1,
            InfoType::Addr => 2,
            InfoType::Unit => 3,
            InfoType::Name => 4,
            InfoType::Version => 5,
            InfoType::Author1 => 6,
            InfoType::Author2 => 7,
            InfoType::Params => 15,
            InfoType::Aux(n) => 16 + n,
        }
    }
}

/// A single metadata request against the shared indexer register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Logical device number; device 0 is the indexer itself.
    pub device: u8,
    /// The metadata field being queried.
    pub info_type: InfoType,
}

impl Request {
    /// Creates a new request.
    pub fn new(device: u8, info_type: InfoType) -> Self {
        Self { device, info_type }
    }

    /// Encodes this request as the 16-bit word written to the register.
    pub fn to_word(self) -> u16 {
        ((self.info_type.code() as u16) << 8) | self.device as u16
    }

    /// Returns whether `word` is the valid reply to this request.
    pub fn matches_reply(self, word: u16) -> bool {
        word == self.to_word() | REPLY_BIT
    }

    /// Returns whether `word` belongs to a different requester's
    /// transaction.
    ///
    /// The low 15 bits of any word observed in the register identify the
    /// in-flight request regardless of whether bit 15 (the reply bit) is
    /// already set. A foreign value means another client currently owns
    /// the register.
    pub fn is_foreign(self, word: u16) -> bool {
        word & REQUEST_MASK != self.to_word()
    }
}
