//! Serial line framing sub-layer.
//!
//! The master talks to the framing layer only through [`Framing`]. It feeds
//! received bytes in, is told when an inter-frame silence closes a frame, and
//! reads the framing state to know whether a reception is still in flight.
//! [`RtuFraming`] is the RTU implementation: frames are delimited by 3.5
//! character times of silence and protected by a CRC-16/MODBUS.

use crate::constants::*;
use crate::types::{Baudrate, FramingState};
use crc::{Crc, CRC_16_MODBUS};

const MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Smallest RTU frame that can carry a response: address, function, CRC
const MIN_RTU_FRAME: usize = 4;

/// Byte-level framing used by the master
pub trait Framing {
    /// Reset for a new line speed; the layer waits for a first silence
    fn init(&mut self, baudrate: Baudrate);

    /// Accept one received byte
    fn ingest(&mut self, byte: u8);

    /// Inter-frame silence elapsed. Returns `true` when it closed a received frame.
    fn on_silence(&mut self) -> bool;

    /// Length of the last received frame without its checksum
    fn frame_len(&self) -> usize;

    /// Byte of the last received frame, address at index 0
    fn byte_at(&self, index: usize) -> Option<u8>;

    /// Whether the last received frame carries a correct checksum
    fn checksum_valid(&self) -> bool;

    /// Build the ADU for `pdu` into `out` and return its length.
    ///
    /// `pdu` must not exceed [`MAX_PDU_LEN`]; the layer switches to emission.
    fn mount_adu(&mut self, pdu: &[u8], responder: u8, out: &mut [u8; MAX_ADU_LEN]) -> usize;

    /// Inter-frame silence expressed in timer ticks
    fn inter_frame_ticks(&self, clock_hz: u32) -> u32;

    fn state(&self) -> FramingState;
}

/// RTU framing with CRC-16/MODBUS
#[derive(Debug, Clone)]
pub struct RtuFraming {
    state: FramingState,
    buffer: [u8; MAX_ADU_LEN],
    len: usize,
    overflow: bool,
    bps: u32,
}

impl Default for RtuFraming {
    fn default() -> Self {
        Self::new()
    }
}

impl RtuFraming {
    pub fn new() -> Self {
        Self {
            state: FramingState::Initial,
            buffer: [0u8; MAX_ADU_LEN],
            len: 0,
            overflow: false,
            bps: DEFAULT_BAUD_RATE,
        }
    }

    /// CRC-16/MODBUS of `data`
    pub fn crc(data: &[u8]) -> u16 {
        MODBUS_CRC.checksum(data)
    }

    /// Raw bytes of the last received frame, checksum included
    pub fn raw_frame(&self) -> &[u8] {
        &self.buffer[..self.len]
    }
}

impl Framing for RtuFraming {
    fn init(&mut self, baudrate: Baudrate) {
        self.bps = baudrate.bps();
        self.state = FramingState::Initial;
        self.len = 0;
        self.overflow = false;
    }

    fn ingest(&mut self, byte: u8) {
        match self.state {
            FramingState::Idle => {
                self.len = 0;
                self.overflow = false;
                self.state = FramingState::Reception;
                self.buffer[0] = byte;
                self.len = 1;
            }
            FramingState::Reception => {
                if self.len < MAX_ADU_LEN {
                    self.buffer[self.len] = byte;
                    self.len += 1;
                } else {
                    self.overflow = true;
                }
            }
            // Line not quiet yet, or our own echo while sending
            FramingState::Initial | FramingState::Emission => {}
        }
    }

    fn on_silence(&mut self) -> bool {
        let completed = self.state == FramingState::Reception;
        self.state = FramingState::Idle;
        completed
    }

    fn frame_len(&self) -> usize {
        self.len.saturating_sub(2)
    }

    fn byte_at(&self, index: usize) -> Option<u8> {
        if index < self.len {
            Some(self.buffer[index])
        } else {
            None
        }
    }

    fn checksum_valid(&self) -> bool {
        if self.overflow || self.len < MIN_RTU_FRAME {
            return false;
        }
        let (data, crc) = self.buffer[..self.len].split_at(self.len - 2);
        Self::crc(data) == u16::from_le_bytes([crc[0], crc[1]])
    }

    fn mount_adu(&mut self, pdu: &[u8], responder: u8, out: &mut [u8; MAX_ADU_LEN]) -> usize {
        let pdu = &pdu[..pdu.len().min(MAX_PDU_LEN)];
        out[0] = responder;
        out[1..=pdu.len()].copy_from_slice(pdu);
        let crc = Self::crc(&out[..=pdu.len()]);
        out[pdu.len() + 1..pdu.len() + RTU_ADU_OVERHEAD].copy_from_slice(&crc.to_le_bytes());
        self.state = FramingState::Emission;
        pdu.len() + RTU_ADU_OVERHEAD
    }

    fn inter_frame_ticks(&self, clock_hz: u32) -> u32 {
        let ticks = if self.bps > DEFAULT_BAUD_RATE {
            clock_hz as u64 * RTU_T35_FIXED_US as u64 / 1_000_000
        } else {
            // 3.5 characters of 11 bits
            clock_hz as u64 * 7 * RTU_BITS_PER_CHAR as u64 / (2 * self.bps as u64)
        };
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }

    fn state(&self) -> FramingState {
        self.state
    }
}
