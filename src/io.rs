//! Register I/O boundary between the query engine and the transport.
//!
//! This crate never opens sockets or serial lines itself. The caller
//! supplies an implementation of [`RegisterIo`] for whatever link connects
//! it to the controller (ADS, Modbus/TCP, a memory-mapped simulation, a
//! network tunnel). The engine only knows about word reads and writes into
//! the controller's shared data area—the transport layer doesn't know
//! anything about the indexer protocol.
//!
//! # Design
//!
//! The boundary follows these principles:
//!
//! - **Protocol agnostic** - implementations move bytes and words, nothing
//!   else; all framing and retry logic lives above this trait
//! - **Synchronous** - blocking calls; the engine performs its own bounded
//!   polling on top
//! - **Byte-addressed** - all addresses are byte offsets into the common
//!   data area, words are little-endian on the wire
//!
//! # Example
//!
//! A minimal in-memory implementation, useful for tests and simulations:
//!
//! ```
//! use pils_indexer::{RegisterIo, Result};
//!
//! struct MemoryLink {
//!     magic: f64,
//!     data: Vec<u8>,
//! }
//!
//! impl RegisterIo for MemoryLink {
//!     fn probe_magic(&mut self) -> Result<f64> {
//!         Ok(self.magic)
//!     }
//!
//!     fn read_u16(&mut self, addr: u16) -> Result<u16> {
//!         let i = addr as usize;
//!         Ok(u16::from_le_bytes([self.data[i], self.data[i + 1]]))
//!     }
//!
//!     fn read_bytes(&mut self, addr: u16, len: usize) -> Result<Vec<u8>> {
//!         let i = addr as usize;
//!         Ok(self.data[i..i + len].to_vec())
//!     }
//!
//!     fn write_u16s(&mut self, addr: u16, values: &[u16]) -> Result<()> {
//!         let mut i = addr as usize;
//!         for value in values {
//!             self.data[i..i + 2].copy_from_slice(&value.to_le_bytes());
//!             i += 2;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::Result;

/// Word-level access to the controller's shared data area.
///
/// Implementations perform blocking I/O and return transport failures as
/// [`IndexerError::Io`](crate::IndexerError::Io). They must not retry on
/// their own: the transaction engine owns the retry and backoff policy.
pub trait RegisterIo {
    /// Reads the version-identifying magic value from its fixed location.
    ///
    /// This is a single bus read with no retry logic. The engine uses it to
    /// gate protocol compatibility before making any structural assumption
    /// about the data area.
    fn probe_magic(&mut self) -> Result<f64>;

    /// Reads one little-endian word at the given byte address.
    fn read_u16(&mut self, addr: u16) -> Result<u16>;

    /// Reads exactly `len` bytes starting at the given byte address.
    fn read_bytes(&mut self, addr: u16, len: usize) -> Result<Vec<u8>>;

    /// Writes consecutive little-endian words starting at the given byte
    /// address.
    fn write_u16s(&mut self, addr: u16, values: &[u16]) -> Result<()>;
}

/// Word order of 32-bit values relative to native IEEE-754 layout.
///
/// Some links deliver 32-bit quantities with their two 16-bit halves in an
/// order inconsistent with the native float byte order. Which convention
/// applies is a property of the transport, so it is passed in explicitly
/// rather than inferred, and tests can exercise both orders
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordOrder {
    /// 16-bit halves arrive in native order; reinterpret directly.
    #[default]
    Standard,
    /// 16-bit halves arrive swapped; exchange them before reinterpreting.
    Swapped,
}

impl WordOrder {
    /// Reinterprets a raw 32-bit register value as an IEEE-754 binary32,
    /// applying this word-order convention first.
    pub fn decode_f32(self, raw: u32) -> f32 {
        match self {
            WordOrder::Standard => f32::from_bits(raw),
            WordOrder::Swapped => f32::from_bits(raw.rotate_left(16)),
        }
    }
}
