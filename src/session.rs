//! Data model: indexer location, session state and device metadata.
//!
//! The central type here is [`Session`], the value returned by a
//! successful [`Indexer::detect`](crate::Indexer::detect). Query methods
//! take a `&Session` argument, so the "resolved before use" invariant
//! holds at the type level: there is no way to issue a metadata query
//! without having bootstrapped first, and no module-global state that
//! could be observed half-initialized.
//!
//! All types are plain values. A `Session` is written once during
//! bootstrap and read-only afterwards; concurrent clients each bootstrap
//! their own.

use crate::error::{IndexerError, Result};
use crate::protocol::ProtocolVersion;

/// Lowest byte address the indexer may occupy; the addresses below are
/// reserved for the magic value and the bootstrap offset word.
pub const MIN_INDEXER_ADDR: u16 = 6;

/// Smallest valid indexer size in bytes (2-byte echo header + 20-byte
/// fixed info struct).
pub const MIN_INDEXER_SIZE: u16 = 22;

/// Largest valid indexer size in bytes.
pub const MAX_INDEXER_SIZE: u16 = 66;

/// Address and byte size of the register window occupied by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerLocation {
    /// Byte address of the indexer's request/reply register.
    pub address: u16,
    /// Size of the indexer window in bytes, echo word included.
    pub size: u16,
}

impl IndexerLocation {
    /// Creates a validated indexer location.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOffset` if the address is below
    /// [`MIN_INDEXER_ADDR`] or not word-aligned, and `InvalidSize` if the
    /// size is outside `[22, 66]` or odd.
    ///
    /// # Example
    ///
    /// ```
    /// use pils_indexer::IndexerLocation;
    ///
    /// let location = IndexerLocation::new(64, 34).unwrap();
    /// assert_eq!(location.payload_size(), 32);
    /// assert_eq!(location.name_field_size(), 12);
    ///
    /// assert!(IndexerLocation::new(5, 34).is_err());
    /// assert!(IndexerLocation::new(64, 20).is_err());
    /// ```
    pub fn new(address: u16, size: u16) -> Result<Self> {
        Self::check_address(address)?;
        Self::check_size(size)?;
        Ok(Self { address, size })
    }

    /// Validates a bootstrap offset before the size is known.
    pub(crate) fn check_address(address: u16) -> Result<()> {
        if address < MIN_INDEXER_ADDR || address % 2 != 0 {
            return Err(IndexerError::invalid_offset(address));
        }
        Ok(())
    }

    /// Validates an indexer size.
    pub(crate) fn check_size(size: u16) -> Result<()> {
        if !(MIN_INDEXER_SIZE..=MAX_INDEXER_SIZE).contains(&size) || size % 2 != 0 {
            return Err(IndexerError::invalid_size(size));
        }
        Ok(())
    }

    /// Number of payload bytes per reply: the window minus the 2-byte
    /// echo header.
    pub fn payload_size(&self) -> usize {
        self.size as usize - 2
    }

    /// Width of the name tail of an info struct: the window minus echo
    /// header and the 20 fixed struct bytes.
    pub fn name_field_size(&self) -> usize {
        self.size as usize - 22
    }
}

/// Structured metadata about one logical device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Device type code; 0 means "no such device".
    pub typecode: u16,
    /// Device size in bytes.
    pub size: u16,
    /// Device byte address in the data area.
    pub address: u16,
    /// Human-readable unit of the main value.
    pub unit: String,
    /// Flag byte; on the indexer's own struct this is the device count
    /// hint.
    pub flags: u8,
    /// Absolute minimum of the main value.
    pub absmin: f32,
    /// Absolute maximum of the main value.
    pub absmax: f32,
    /// Device name, `None` when the transferred name field lacked its
    /// terminating NUL (possible truncation).
    pub name: Option<String>,
}

/// Extended firmware metadata, resolved by an extended bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareInfo {
    /// The firmware name string reported by the controller.
    pub name: String,
    /// The firmware version string.
    pub version: String,
    /// The author fields, joined with a newline.
    pub author: String,
}

/// Negotiated session state: everything `detect` resolved about the
/// controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The negotiated protocol revision.
    pub version: ProtocolVersion,
    /// The resolved and cross-validated indexer location.
    pub location: IndexerLocation,
    /// Device count hint from the indexer's flag byte, when provided.
    pub num_devices: Option<u8>,
    /// Firmware metadata, present after an extended bootstrap.
    pub firmware: Option<FirmwareInfo>,
}
