//! # PILS Indexer Query Engine
//!
//! A Rust library for querying the self-describing "indexer" of a
//! PILS-compliant PLC: the distinguished device that answers metadata
//! queries about itself and about all other logical devices the
//! controller exposes.
//!
//! This is a **protocol-only** library—no transports, no device
//! enumeration loop, no write-side device control. The caller supplies a
//! [`RegisterIo`] implementation for whatever link connects it to the
//! controller (ADS, Modbus/TCP, a memory-mapped simulation), and drives
//! the scan itself.
//!
//! ## Features
//!
//! - **Version gating** — the magic value is probed and validated before
//!   any structural assumption about the data area is made
//! - **Race-safe transactions** — the shared request/reply register has
//!   no framing or sequence numbers; replies are correlated by value
//!   matching, foreign in-flight requests are detected and the register
//!   reclaimed, with bounded quadratic backoff
//! - **Self-validating bootstrap** — the indexer's location is resolved
//!   through two independent code paths and cross-checked
//! - **Typed decoders** — words, strings, byte blobs, bitmaps, units and
//!   the composite info struct, each with a fixed layout
//! - **No panics** — all errors returned as `Result<T, IndexerError>`
//!
//! ## Quick Start
//!
//! ```
//! # struct Sim { req: u16 }
//! # impl pils_indexer::RegisterIo for Sim {
//! #     fn probe_magic(&mut self) -> pils_indexer::Result<f64> { Ok(2015.02) }
//! #     fn read_u16(&mut self, _addr: u16) -> pils_indexer::Result<u16> { Ok(64) }
//! #     fn read_bytes(&mut self, _addr: u16, len: usize) -> pils_indexer::Result<Vec<u8>> {
//! #         let mut data = (self.req | 0x8000).to_le_bytes().to_vec();
//! #         if self.req >> 8 == 1 {
//! #             data.extend_from_slice(&34u16.to_le_bytes());
//! #         } else {
//! #             let mut s = vec![0u8; len - 2];
//! #             s[2..4].copy_from_slice(&34u16.to_le_bytes());
//! #             s[4..6].copy_from_slice(&64u16.to_le_bytes());
//! #             data.extend_from_slice(&s);
//! #         }
//! #         data.resize(len, 0);
//! #         Ok(data)
//! #     }
//! #     fn write_u16s(&mut self, _addr: u16, values: &[u16]) -> pils_indexer::Result<()> {
//! #         self.req = values[0];
//! #         Ok(())
//! #     }
//! # }
//! # fn connect() -> Sim { Sim { req: 0 } }
//! use pils_indexer::Indexer;
//!
//! fn main() -> pils_indexer::Result<()> {
//!     // `connect()` yields any RegisterIo implementation
//!     let mut indexer = Indexer::new(connect());
//!
//!     // Verify protocol compatibility and resolve the indexer
//!     let session = indexer.detect(false)?;
//!     assert_eq!(session.version.to_string(), "2015_02");
//!     assert_eq!(session.location.address, 64);
//!
//!     // The session is the ticket for all further queries:
//!     let info = indexer.query_infostruct(&session, 0)?;
//!     println!("indexer occupies {} bytes", info.size);
//!     Ok(())
//! }
//! ```
//!
//! ## Shared-Register Model
//!
//! The indexer register is a bare, lock-free resource shared with any
//! number of unrelated clients. A request is one 16-bit word,
//! `(info_type << 8) | device_number`; the controller answers by echoing
//! it with bit 15 set. The engine polls for the echo with a budget of 32
//! attempts, re-writes its request whenever it observes a foreign word in
//! the register, and backs off quadratically in between. Multiple engine
//! instances (or entirely unrelated programs) compete through exactly
//! this discipline; no client-side lock exists or is needed.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, IndexerError>`]. Bootstrap failures
//! are structural and never retried; a per-device query failure is meant
//! to be caught by the scanning caller, which can continue with the
//! remaining device numbers.
//!
//! ```no_run
//! use pils_indexer::{Indexer, IndexerError, RegisterIo};
//!
//! fn report<T: RegisterIo>(indexer: &mut Indexer<T>) {
//!     match indexer.detect(true) {
//!         Ok(session) => println!("PILS {}", session.version),
//!         Err(IndexerError::UnsupportedVersion { magic }) => {
//!             println!("not a supported controller (magic {magic})");
//!         }
//!         Err(IndexerError::Timeout) => println!("controller not answering"),
//!         Err(e) => println!("bootstrap failed: {e}"),
//!     }
//! }
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (race recoveries, retry
//! exhaustion, bootstrap progress) and installs no subscriber; binaries
//! choose their own.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod decode;
mod error;
mod indexer;
mod io;
mod protocol;
mod session;
mod transaction;
pub mod units;

#[cfg(test)]
pub(crate) mod testutil;

// Public re-exports
pub use decode::{RawInfoStruct, INFO_STRUCT_FIXED_SIZE};
pub use error::{IndexerError, Result};
pub use indexer::Indexer;
pub use io::{RegisterIo, WordOrder};
pub use protocol::{
    InfoType, ProtocolVersion, Request, INDEXER_OFFSET_ADDR, REPLY_BIT, REQUEST_MASK,
};
pub use session::{
    DeviceInfo, FirmwareInfo, IndexerLocation, Session, MAX_INDEXER_SIZE, MIN_INDEXER_ADDR,
    MIN_INDEXER_SIZE,
};
pub use transaction::{PollOutcome, Polling, DEFAULT_BACKOFF_STEP, MAX_POLL_ATTEMPTS};
