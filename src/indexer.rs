//! The indexer query engine: bootstrap validation and metadata queries.
//!
//! [`Indexer`] wraps a caller-supplied [`RegisterIo`] transport and is the
//! only component that writes to the shared indexer register. It provides:
//!
//! - [`Indexer::detect`] - verify protocol compatibility, resolve and
//!   cross-validate the indexer's own location, optionally pull firmware
//!   metadata; returns a [`Session`]
//! - [`Indexer::query_data`] - one raw request/reply transaction with
//!   bounded retries and race recovery
//! - `query_word` / `query_bytes` / `query_string` / `query_bitmap` /
//!   `query_unit` / `query_infostruct` - typed decoders on top of it
//!
//! # Shared-Register Discipline
//!
//! The request/reply register is shared with any number of unrelated
//! clients and carries no client channel or sequence numbers. A reply is
//! correlated to its request purely by value: the controller echoes the
//! request word with bit 15 set. When a poll observes a word whose low
//! 15 bits belong to someone else's transaction, the engine re-writes its
//! own request to reclaim the register and backs off quadratically. A
//! caller that needs concurrency runs multiple `Indexer` instances; they
//! compete through exactly this protocol, with no client-side lock.
//!
//! # Cancellation
//!
//! The only timeout is the bounded 32-attempt retry budget. All calls
//! block; callers needing cancellation must race the call at a higher
//! layer.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::decode::{self, RawInfoStruct};
use crate::error::{IndexerError, Result};
use crate::io::{RegisterIo, WordOrder};
use crate::protocol::{InfoType, ProtocolVersion, Request, INDEXER_OFFSET_ADDR};
use crate::session::{DeviceInfo, FirmwareInfo, IndexerLocation, Session};
use crate::transaction::{PollOutcome, Polling, DEFAULT_BACKOFF_STEP};
use crate::units;

/// Query engine for a PILS indexer, generic over the register transport.
///
/// # Example
///
/// ```no_run
/// use pils_indexer::{Indexer, InfoType, RegisterIo, Result};
///
/// fn scan<T: RegisterIo>(io: T) -> Result<()> {
///     let mut indexer = Indexer::new(io);
///     let session = indexer.detect(true)?;
///     println!("controller speaks PILS {}", session.version);
///
///     for device in 1..=255 {
///         let info = indexer.query_infostruct(&session, device)?;
///         if info.typecode == 0 {
///             break; // past the last device
///         }
///         println!("device {device}: {:?} at {}", info.name, info.address);
///     }
///     Ok(())
/// }
/// ```
pub struct Indexer<T> {
    io: T,
    word_order: WordOrder,
    backoff_step: Duration,
    session: Option<Session>,
}

impl<T: RegisterIo> Indexer<T> {
    /// Creates an engine over the given transport with the default word
    /// order and backoff step.
    pub fn new(io: T) -> Self {
        Self {
            io,
            word_order: WordOrder::default(),
            backoff_step: DEFAULT_BACKOFF_STEP,
            session: None,
        }
    }

    /// Sets the 32-bit word order the transport delivers (default
    /// [`WordOrder::Standard`]).
    pub fn with_word_order(mut self, word_order: WordOrder) -> Self {
        self.word_order = word_order;
        self
    }

    /// Sets the unit step of the quadratic retry backoff (default 1 ms).
    ///
    /// Mostly useful for tests and simulations, where a zero step runs
    /// the full retry budget without wall-clock delays.
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    /// Returns the session resolved by a previous [`Indexer::detect`],
    /// if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Consumes the engine and returns the transport.
    pub fn into_inner(self) -> T {
        self.io
    }

    /// Establishes communication with the indexer and returns the
    /// negotiated session.
    ///
    /// The bootstrap sequence:
    ///
    /// 1. probe the magic value; an unsupported revision aborts with no
    ///    further register traffic,
    /// 2. read the indexer offset from the fixed bootstrap word and
    ///    validate it,
    /// 3. query the indexer's size through the transaction engine and
    ///    validate it,
    /// 4. query the indexer's own info struct and cross-validate its
    ///    self-reported location against steps 2-3 (a mismatch means the
    ///    transport is unreliable and is fatal),
    /// 5. with `extended`, resolve the firmware name, version and author
    ///    strings.
    ///
    /// The call is idempotent: once a session is resolved, further calls
    /// return it without issuing bus traffic. An `extended` call after a
    /// non-extended one only issues the three firmware queries.
    ///
    /// # Errors
    ///
    /// `UnsupportedVersion`, `InvalidOffset`, `InvalidSize` and
    /// `InconsistentBootstrap` are structural and never retried here;
    /// `Timeout` and `Io` propagate from the transaction engine.
    pub fn detect(&mut self, extended: bool) -> Result<Session> {
        if let Some(mut session) = self.session.take() {
            if extended && session.firmware.is_none() {
                // resolved without firmware: only the string queries are left
                match self.read_firmware(&session.location) {
                    Ok(firmware) => session.firmware = Some(firmware),
                    Err(e) => {
                        self.session = Some(session);
                        return Err(e);
                    }
                }
            }
            self.session = Some(session.clone());
            return Ok(session);
        }

        let magic = self.io.probe_magic()?;
        let version = ProtocolVersion::from_magic(magic)?;
        debug!(magic, %version, "magic probe ok");

        let address = self.io.read_u16(INDEXER_OFFSET_ADDR)?;
        IndexerLocation::check_address(address)?;

        let payload = self.transact(address, Request::new(0, InfoType::Size), 2)?;
        let size = u16::from_le_bytes([payload[0], payload[1]]);
        let location = IndexerLocation::new(address, size)?;

        let own = self.infostruct_at(&location, 0)?;
        if (own.size != 0 || own.address != 0) && (own.size != size || own.address != address) {
            return Err(IndexerError::InconsistentBootstrap {
                queried_addr: address,
                queried_size: size,
                reported_addr: own.address,
                reported_size: own.size,
            });
        }
        let num_devices = match (own.flags & 0xFF) as u8 {
            0 => None,
            n => Some(n),
        };

        let firmware = if extended {
            Some(self.read_firmware(&location)?)
        } else {
            None
        };

        info!(%version, address, size, "indexer detected");
        let session = Session {
            version,
            location,
            num_devices,
            firmware,
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Performs one raw metadata transaction and returns the payload
    /// bytes, `payload_len` of them, without the 2-byte echo header.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` when the 32-attempt retry budget is exhausted
    /// without a matching echo, and propagates transport errors.
    pub fn query_data(
        &mut self,
        session: &Session,
        device: u8,
        info_type: InfoType,
        payload_len: usize,
    ) -> Result<Vec<u8>> {
        self.transact(
            session.location.address,
            Request::new(device, info_type),
            payload_len,
        )
    }

    /// Queries a single 16-bit value.
    pub fn query_word(&mut self, session: &Session, device: u8, info_type: InfoType) -> Result<u16> {
        let payload = self.query_data(session, device, info_type, 2)?;
        Ok(u16::from_le_bytes([payload[0], payload[1]]))
    }

    /// Queries the raw payload, sized to the indexer's full word budget.
    pub fn query_bytes(
        &mut self,
        session: &Session,
        device: u8,
        info_type: InfoType,
    ) -> Result<Vec<u8>> {
        self.query_data(session, device, info_type, session.location.payload_size())
    }

    /// Queries a string field with the lenient trust policy: text up to
    /// the first NUL, or the whole field when no NUL is present.
    pub fn query_string(
        &mut self,
        session: &Session,
        device: u8,
        info_type: InfoType,
    ) -> Result<String> {
        let payload = self.query_bytes(session, device, info_type)?;
        Ok(decode::string_lenient(&payload))
    }

    /// Queries a bitmap field and returns the set bit positions in
    /// ascending order.
    pub fn query_bitmap(
        &mut self,
        session: &Session,
        device: u8,
        info_type: InfoType,
    ) -> Result<Vec<u16>> {
        let payload = self.query_bytes(session, device, info_type)?;
        Ok(decode::decode_bitmap(&payload))
    }

    /// Queries the unit of a device's main value as a display string.
    pub fn query_unit(&mut self, session: &Session, device: u8, info_type: InfoType) -> Result<String> {
        let payload = self.query_data(session, device, info_type, 2)?;
        Ok(units::unit_string(payload[0], payload[1] as i8))
    }

    /// Queries the composite info struct of a device.
    ///
    /// The name is only trusted if its terminating NUL lies strictly
    /// inside the transferred name window; otherwise the transfer may
    /// have truncated it and it is reported as `None`.
    pub fn query_infostruct(&mut self, session: &Session, device: u8) -> Result<DeviceInfo> {
        let raw = self.infostruct_at(&session.location, device)?;
        Ok(DeviceInfo {
            typecode: raw.typecode,
            size: raw.size,
            address: raw.address,
            unit: units::unit_string(raw.unit_code, raw.unit_exp),
            flags: (raw.flags & 0xFF) as u8,
            absmin: raw.absmin(self.word_order),
            absmax: raw.absmax(self.word_order),
            name: raw.name_string(),
        })
    }

    /// Raw info struct query against an explicit location; used both by
    /// the bootstrap (before a session exists) and the public decoder.
    fn infostruct_at(&mut self, location: &IndexerLocation, device: u8) -> Result<RawInfoStruct> {
        let payload = self.transact(
            location.address,
            Request::new(device, InfoType::Struct),
            location.payload_size(),
        )?;
        RawInfoStruct::from_bytes(&payload)
    }

    /// Reads the firmware metadata strings from the indexer.
    ///
    /// A field whose terminating NUL is missing was truncated by the
    /// transfer window; it degrades to an empty string rather than
    /// failing the bootstrap.
    fn read_firmware(&mut self, location: &IndexerLocation) -> Result<FirmwareInfo> {
        let name = self.firmware_string(location, InfoType::Name)?;
        let version = self.firmware_string(location, InfoType::Version)?;
        let author1 = self.firmware_string(location, InfoType::Author1)?;
        let author2 = self.firmware_string(location, InfoType::Author2)?;

        let author = match (author1.is_empty(), author2.is_empty()) {
            (false, false) => format!("{author1}\n{author2}"),
            (false, true) => author1,
            (true, _) => author2,
        };
        Ok(FirmwareInfo {
            name,
            version,
            author,
        })
    }

    fn firmware_string(&mut self, location: &IndexerLocation, info_type: InfoType) -> Result<String> {
        let payload = self.transact(
            location.address,
            Request::new(0, info_type),
            location.payload_size(),
        )?;
        match decode::string_strict(&payload) {
            Some(text) => Ok(text),
            None => {
                warn!(?info_type, "firmware field not terminated, treating as empty");
                Ok(String::new())
            }
        }
    }

    /// The request/reply transaction driver.
    ///
    /// Writes the request word, then polls the register until the echoed
    /// reply appears, reclaiming the register whenever a foreign request
    /// is observed and backing off quadratically between reads.
    fn transact(&mut self, addr: u16, request: Request, payload_len: usize) -> Result<Vec<u8>> {
        let word = request.to_word();
        self.io.write_u16s(addr, &[word])?;

        let mut poll = Polling::new(request);
        loop {
            let data = self.io.read_bytes(addr, 2 + payload_len)?;
            if data.len() < 2 + payload_len {
                return Err(IndexerError::short_payload(2 + payload_len, data.len()));
            }
            let echo = u16::from_le_bytes([data[0], data[1]]);

            match poll.observe(echo) {
                PollOutcome::Matched => {
                    trace!(
                        request = word,
                        attempts = poll.attempts(),
                        "reply matched"
                    );
                    return Ok(data[2..2 + payload_len].to_vec());
                }
                PollOutcome::RaceDetected => {
                    debug!(
                        request = word,
                        observed = echo,
                        "foreign request in register, reclaiming"
                    );
                    self.io.write_u16s(addr, &[word])?;
                }
                PollOutcome::Pending => {}
            }

            if poll.exhausted() {
                warn!(
                    request = word,
                    attempts = poll.attempts(),
                    "no matching reply, giving up"
                );
                return Err(IndexerError::Timeout);
            }
            let delay = poll.backoff(self.backoff_step);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }
}

impl<T> std::fmt::Debug for Indexer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("word_order", &self.word_order)
            .field("backoff_step", &self.backoff_step)
            .field("session", &self.session)
            .finish()
    }
}
