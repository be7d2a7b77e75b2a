//! Protocol constants for Modbus over Serial Line.
//!
//! This module defines the addressing, frame size, timing and serial line
//! constants shared by the master engine and the RTU framing sub-layer.

use crate::types::LineSettings;
use serialport::{DataBits, Parity, StopBits};

/// Responder identity addressing every slave; no reply is expected
pub const BROADCAST_ADDRESS: u8 = 0;

/// Maximum length of a serial line ADU (address + PDU + CRC)
pub const MAX_ADU_LEN: usize = 256;

/// Bytes added around the PDU in RTU mode (address + 2 CRC bytes)
pub const RTU_ADU_OVERHEAD: usize = 3;

/// Maximum PDU length that still fits in an RTU ADU
pub const MAX_PDU_LEN: usize = MAX_ADU_LEN - RTU_ADU_OVERHEAD;

/// Baudrate selected when the configuration asks for the default
pub const DEFAULT_BAUD_RATE: u32 = 19200;

/// Default number of attempts per request (first send included)
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Default platform clock frequency in ticks per second
pub const DEFAULT_CLOCK_HZ: u32 = 50_000_000;

/// Bits per RTU character (start + 8 data + parity + stop)
pub const RTU_BITS_PER_CHAR: u32 = 11;

/// Fixed inter-frame silence above 19200 baud, in microseconds
pub const RTU_T35_FIXED_US: u32 = 1750;

/// RTU line: 8 data bits, even parity, one stop bit
pub const RTU_LINE: LineSettings = LineSettings {
    data_bits: DataBits::Eight,
    parity: Parity::Even,
    stop_bits: StopBits::One,
};

/// ASCII line: 7 data bits, even parity, one stop bit
pub const ASCII_LINE: LineSettings = LineSettings {
    data_bits: DataBits::Seven,
    parity: Parity::Even,
    stop_bits: StopBits::One,
};

/// Read timeout for the host serial port in milliseconds
pub const SERIAL_READ_TIMEOUT_MS: u64 = 1;
