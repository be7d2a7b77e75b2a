use crate::constants::*;
use crate::error::MasterError;
use serde::{Deserialize, Serialize};
use serialport::{DataBits, Parity, StopBits};
use std::fmt;
use std::str::FromStr;

/// Serial line baudrates understood by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Baudrate {
    B1200,
    B2400,
    B4800,
    B9600,
    #[default]
    B19200,
}

impl Baudrate {
    /// Bits per second
    pub fn bps(self) -> u32 {
        match self {
            Baudrate::B1200 => 1200,
            Baudrate::B2400 => 2400,
            Baudrate::B4800 => 4800,
            Baudrate::B9600 => 9600,
            Baudrate::B19200 => 19200,
        }
    }
}

impl TryFrom<u32> for Baudrate {
    type Error = MasterError;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        match bps {
            1200 => Ok(Baudrate::B1200),
            2400 => Ok(Baudrate::B2400),
            4800 => Ok(Baudrate::B4800),
            9600 => Ok(Baudrate::B9600),
            19200 => Ok(Baudrate::B19200),
            other => Err(MasterError::UnsupportedBaudrate(other)),
        }
    }
}

impl FromStr for Baudrate {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bps = s
            .trim()
            .parse::<u32>()
            .map_err(|e| MasterError::InvalidConfig(format!("baudrate {:?}: {}", s, e)))?;
        Baudrate::try_from(bps)
    }
}

impl From<Baudrate> for u32 {
    fn from(baud: Baudrate) -> u32 {
        baud.bps()
    }
}

impl fmt::Display for Baudrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bps", self.bps())
    }
}

/// Serial line transmission mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Rtu,
    Ascii,
}

impl Mode {
    /// UART character format for the mode
    pub fn line_settings(self) -> LineSettings {
        match self {
            Mode::Rtu => RTU_LINE,
            Mode::Ascii => ASCII_LINE,
        }
    }
}

/// UART character format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

/// Master configuration, fixed between two calls to `init`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfiguration {
    pub baudrate: Baudrate,
    pub mode: Mode,
    /// Sends allowed per request, first transmission included
    pub max_attempts: u8,
    /// Timer clock frequency in ticks per second
    pub clock_hz: u32,
}

impl Default for SystemConfiguration {
    fn default() -> Self {
        Self {
            baudrate: Baudrate::default(),
            mode: Mode::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            clock_hz: DEFAULT_CLOCK_HZ,
        }
    }
}

impl SystemConfiguration {
    pub fn new(baudrate: Baudrate, mode: Mode, max_attempts: u8) -> Self {
        Self {
            baudrate,
            mode,
            max_attempts,
            ..Self::default()
        }
    }

    /// Override the timer clock frequency
    pub fn with_clock_hz(mut self, clock_hz: u32) -> Self {
        self.clock_hz = clock_hz;
        self
    }

    /// Check the values `init` relies on.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_attempts == 0 {
            return Err(MasterError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.clock_hz == 0 {
            return Err(MasterError::InvalidConfig(
                "clock_hz must be non-zero".to_string(),
            ));
        }
        if self.mode != Mode::Rtu {
            return Err(MasterError::UnsupportedMode(self.mode));
        }
        Ok(())
    }
}

/// Overall master behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainState {
    Initial,
    Idle,
    WaitReply,
    Delay,
    Processing,
    Error,
}

/// State of the framing sub-layer, read by the master but never written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingState {
    Initial,
    Idle,
    Reception,
    Emission,
}

impl FramingState {
    /// No reception or emission in flight
    pub fn is_idle(self) -> bool {
        self == FramingState::Idle
    }
}

/// Physical-layer verdict on the frame being received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameValidity {
    #[default]
    Ok,
    Nok,
}

/// Event raised by the UART receive interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    Byte(u8),
    ParityError,
}

/// Logically impossible condition that stops the engine for good
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Response/broadcast timer fired outside WaitReply and Delay
    UnexpectedTimerExpiry(MainState),
}

impl Fault {
    /// Numeric fault code as reported on the wire-side diagnostics
    pub fn code(&self) -> u8 {
        match self {
            Fault::UnexpectedTimerExpiry(_) => 110,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::UnexpectedTimerExpiry(state) => {
                write!(f, "timer expired in state {:?} (code {})", state, self.code())
            }
        }
    }
}

/// Outbound frame kept for retransmission and reply matching
#[derive(Debug, Clone)]
pub struct TransmissionContext {
    pub(crate) adu: [u8; MAX_ADU_LEN],
    pub(crate) adu_len: usize,
    pub(crate) expected_responder: u8,
    pub(crate) attempt: u8,
}

impl Default for TransmissionContext {
    fn default() -> Self {
        Self {
            adu: [0u8; MAX_ADU_LEN],
            adu_len: 0,
            expected_responder: BROADCAST_ADDRESS,
            attempt: 1,
        }
    }
}

impl TransmissionContext {
    /// Assembled ADU bytes
    pub fn adu(&self) -> &[u8] {
        &self.adu[..self.adu_len]
    }

    pub fn expected_responder(&self) -> u8 {
        self.expected_responder
    }

    /// Current attempt, starting at 1
    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    pub fn is_broadcast(&self) -> bool {
        self.expected_responder == BROADCAST_ADDRESS
    }
}
