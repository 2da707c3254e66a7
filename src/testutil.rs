//! Test doubles for the register transport.
//!
//! Two fixtures back the engine tests:
//!
//! - [`MockRegisters`] - a dumb recorder: canned magic and bootstrap
//!   words, a register that echoes the last written word without ever
//!   answering. Used to pin down traffic ordering and the timeout path.
//! - [`SimulatedPlc`] - behaves like a live controller with an indexer
//!   and a couple of devices, including knobs for injecting races,
//!   inconsistent self-descriptions and swapped float word order.

use std::collections::HashMap;

use crate::error::Result;
use crate::io::{RegisterIo, WordOrder};
use crate::protocol::{INDEXER_OFFSET_ADDR, REPLY_BIT};

/// Operations a fixture records, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Probe,
    ReadU16,
    ReadBytes,
    Write,
}

/// Scripted register transport that records traffic and never answers.
pub(crate) struct MockRegisters {
    magic: f64,
    words: HashMap<u16, u16>,
    last_request: Option<u16>,
    /// Every `write_u16s` call as `(addr, values)`.
    pub writes: Vec<(u16, Vec<u16>)>,
    /// Number of `read_bytes` calls.
    pub reads: usize,
}

impl MockRegisters {
    pub fn new(magic: f64) -> Self {
        Self {
            magic,
            words: HashMap::new(),
            last_request: None,
            writes: Vec::new(),
            reads: 0,
        }
    }

    pub fn set_word(&mut self, addr: u16, value: u16) {
        self.words.insert(addr, value);
    }
}

impl RegisterIo for MockRegisters {
    fn probe_magic(&mut self) -> Result<f64> {
        Ok(self.magic)
    }

    fn read_u16(&mut self, addr: u16) -> Result<u16> {
        Ok(*self.words.get(&addr).unwrap_or(&0))
    }

    fn read_bytes(&mut self, _addr: u16, len: usize) -> Result<Vec<u8>> {
        self.reads += 1;
        // a dead register: the request sits there, never answered
        let mut data = self.last_request.unwrap_or(0).to_le_bytes().to_vec();
        data.resize(len, 0);
        Ok(data)
    }

    fn write_u16s(&mut self, addr: u16, values: &[u16]) -> Result<()> {
        self.writes.push((addr, values.to_vec()));
        self.last_request = values.first().copied();
        Ok(())
    }
}

/// One simulated device behind the indexer.
pub(crate) struct SimDevice {
    pub typecode: u16,
    pub size: u16,
    pub address: u16,
    pub unit_code: u8,
    pub unit_exp: i8,
    pub flags: u32,
    pub absmin: f32,
    pub absmax: f32,
    /// Raw name field bytes, terminator included (or deliberately not).
    pub name: Vec<u8>,
    /// Raw params field bytes (list or bitmap).
    pub params: Vec<u8>,
}

/// Simulated controller with a working indexer.
pub(crate) struct SimulatedPlc {
    pub magic: f64,
    pub indexer_addr: u16,
    pub indexer_size: u16,
    /// Device count hint served in the indexer's own flag byte.
    pub num_devices_hint: u8,
    /// Self-reported address in the indexer's info struct, when it should
    /// differ from the real one.
    pub struct_addr_override: Option<u16>,
    /// Self-reported size in the indexer's info struct.
    pub struct_size_override: Option<u16>,
    /// Served once as the register content before the pending request is
    /// processed, simulating a stale foreign transaction.
    pub stale_word: Option<u16>,
    /// Word order applied to the floats in served info structs.
    pub float_word_order: WordOrder,
    devices: HashMap<u8, SimDevice>,
    register: u16,
    ops: Vec<Op>,
    request_log: Vec<u16>,
}

impl SimulatedPlc {
    pub fn new() -> Self {
        let mut devices = HashMap::new();
        devices.insert(
            1,
            SimDevice {
                typecode: 0x3008,
                size: 16,
                address: 98,
                unit_code: 11,
                unit_exp: -3,
                flags: 0,
                absmin: 0.0,
                absmax: 1200.0,
                name: b"ccr1_p1\0".to_vec(),
                params: Vec::new(),
            },
        );
        devices.insert(
            2,
            SimDevice {
                typecode: 0x1E03,
                size: 10,
                address: 114,
                unit_code: 8,
                unit_exp: 0,
                flags: 0,
                absmin: 1.5,
                absmax: 325.0,
                name: b"ccr1_T\0".to_vec(),
                params: Vec::new(),
            },
        );
        Self {
            magic: 2015.02,
            indexer_addr: 64,
            indexer_size: 34,
            num_devices_hint: 2,
            struct_addr_override: None,
            struct_size_override: None,
            stale_word: None,
            float_word_order: WordOrder::Standard,
            devices,
            register: 0,
            ops: Vec::new(),
            request_log: Vec::new(),
        }
    }

    pub fn device_mut(&mut self, number: u8) -> &mut SimDevice {
        self.devices.entry(number).or_insert_with(|| SimDevice {
            typecode: 0x1201,
            size: 4,
            address: 200,
            unit_code: 0,
            unit_exp: 0,
            flags: 0,
            absmin: 0.0,
            absmax: 0.0,
            name: b"dev\0".to_vec(),
            params: Vec::new(),
        })
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    pub fn probe_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == Op::Probe).count()
    }

    pub fn write_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == Op::Write).count()
    }

    pub fn request_log(&self) -> &[u16] {
        &self.request_log
    }

    pub fn clear_logs(&mut self) {
        self.ops.clear();
        self.request_log.clear();
    }

    /// Whether every recorded write came after the first magic probe.
    pub fn first_write_after_probe(&self) -> bool {
        let probe = self.ops.iter().position(|op| *op == Op::Probe);
        let write = self.ops.iter().position(|op| *op == Op::Write);
        match (probe, write) {
            (Some(p), Some(w)) => p < w,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }

    fn encode_f32(&self, value: f32) -> [u8; 4] {
        let bits = match self.float_word_order {
            WordOrder::Standard => value.to_bits(),
            WordOrder::Swapped => value.to_bits().rotate_left(16),
        };
        bits.to_le_bytes()
    }

    fn struct_payload(&self, device: u8) -> Vec<u8> {
        let mut payload = Vec::new();
        if device == 0 {
            let size = self.struct_size_override.unwrap_or(self.indexer_size);
            let addr = self.struct_addr_override.unwrap_or(self.indexer_addr);
            payload.extend_from_slice(&0x0A00u16.to_le_bytes());
            payload.extend_from_slice(&size.to_le_bytes());
            payload.extend_from_slice(&addr.to_le_bytes());
            payload.push(0);
            payload.push(0);
            payload.extend_from_slice(&(self.num_devices_hint as u32).to_le_bytes());
            payload.extend_from_slice(&self.encode_f32(0.0));
            payload.extend_from_slice(&self.encode_f32(0.0));
            payload.extend_from_slice(b"indexer\0");
        } else if let Some(dev) = self.devices.get(&device) {
            payload.extend_from_slice(&dev.typecode.to_le_bytes());
            payload.extend_from_slice(&dev.size.to_le_bytes());
            payload.extend_from_slice(&dev.address.to_le_bytes());
            payload.push(dev.unit_code);
            payload.push(dev.unit_exp as u8);
            payload.extend_from_slice(&dev.flags.to_le_bytes());
            payload.extend_from_slice(&self.encode_f32(dev.absmin));
            payload.extend_from_slice(&self.encode_f32(dev.absmax));
            payload.extend_from_slice(&dev.name);
        }
        // typecode 0 (empty payload) means "past the last device"
        payload
    }

    fn answer(&self, request: u16) -> Vec<u8> {
        let device = (request & 0xFF) as u8;
        let code = (request >> 8) as u8;
        match code {
            0 => self.struct_payload(device),
            1 => {
                let size = if device == 0 {
                    self.indexer_size
                } else {
                    self.devices.get(&device).map_or(0, |d| d.size)
                };
                size.to_le_bytes().to_vec()
            }
            2 => {
                let addr = if device == 0 {
                    self.indexer_addr
                } else {
                    self.devices.get(&device).map_or(0, |d| d.address)
                };
                addr.to_le_bytes().to_vec()
            }
            3 => self
                .devices
                .get(&device)
                .map_or(vec![0, 0], |d| vec![d.unit_code, d.unit_exp as u8]),
            4 => {
                if device == 0 {
                    b"testbox\0".to_vec()
                } else {
                    self.devices.get(&device).map_or_else(Vec::new, |d| d.name.clone())
                }
            }
            5 => b"1.4.2\0".to_vec(),
            6 => b"A. Nyone\0".to_vec(),
            7 => b"plc@example.org\0".to_vec(),
            15 => self
                .devices
                .get(&device)
                .map_or_else(Vec::new, |d| d.params.clone()),
            _ => Vec::new(),
        }
    }
}

impl RegisterIo for SimulatedPlc {
    fn probe_magic(&mut self) -> Result<f64> {
        self.ops.push(Op::Probe);
        Ok(self.magic)
    }

    fn read_u16(&mut self, addr: u16) -> Result<u16> {
        self.ops.push(Op::ReadU16);
        if addr == INDEXER_OFFSET_ADDR {
            Ok(self.indexer_addr)
        } else {
            Ok(0)
        }
    }

    fn read_bytes(&mut self, _addr: u16, len: usize) -> Result<Vec<u8>> {
        self.ops.push(Op::ReadBytes);
        if let Some(stale) = self.stale_word.take() {
            let mut data = stale.to_le_bytes().to_vec();
            data.resize(len, 0);
            return Ok(data);
        }
        let mut data = (self.register | REPLY_BIT).to_le_bytes().to_vec();
        data.extend_from_slice(&self.answer(self.register));
        data.resize(len, 0);
        Ok(data)
    }

    fn write_u16s(&mut self, _addr: u16, values: &[u16]) -> Result<()> {
        self.ops.push(Op::Write);
        if let Some(&word) = values.first() {
            self.register = word;
            self.request_log.push(word);
        }
        Ok(())
    }
}
