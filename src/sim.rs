//! Hardware-free transport and timers for tests and desktop simulation.
//!
//! Nothing here touches a real peripheral: sent bytes are recorded, timers
//! only remember what they were armed with, and the caller decides when an
//! expiry happens.

use crate::error::{MasterError, Result};
use crate::framing::RtuFraming;
use crate::hal::{Timer, Transport};
use crate::types::LineSettings;
use std::io;

/// Recording serial line
#[derive(Debug, Default)]
pub struct SimTransport {
    line: Option<(u32, LineSettings)>,
    sent: Vec<u8>,
    activity: bool,
    activity_pulses: u32,
    fail_next: bool,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baudrate and character format from the last `configure`
    pub fn line(&self) -> Option<(u32, LineSettings)> {
        self.line
    }

    /// Every byte sent since the last `take_sent`
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.sent)
    }

    /// Current state of the activity indicator
    pub fn activity(&self) -> bool {
        self.activity
    }

    /// Number of times the activity indicator was switched on
    pub fn activity_pulses(&self) -> u32 {
        self.activity_pulses
    }

    /// Make the next `send_byte` fail with an I/O error
    pub fn fail_next_send(&mut self) {
        self.fail_next = true;
    }
}

impl Transport for SimTransport {
    fn configure(&mut self, bps: u32, line: LineSettings) -> Result<()> {
        self.line = Some((bps, line));
        Ok(())
    }

    fn send_byte(&mut self, byte: u8) -> Result<()> {
        if std::mem::take(&mut self.fail_next) {
            return Err(MasterError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated line failure",
            )));
        }
        self.sent.push(byte);
        Ok(())
    }

    fn set_activity(&mut self, on: bool) {
        if on && !self.activity {
            self.activity_pulses += 1;
        }
        self.activity = on;
    }
}

/// Operation seen by a [`SimTimer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOp {
    Arm(u32),
    Cancel,
}

/// Timer that only records what it was asked to do
#[derive(Debug, Default)]
pub struct SimTimer {
    armed: Option<u32>,
    history: Vec<TimerOp>,
}

impl SimTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Ticks of the running countdown
    pub fn armed_ticks(&self) -> Option<u32> {
        self.armed
    }

    pub fn history(&self) -> &[TimerOp] {
        &self.history
    }

    /// Let the countdown run out. Returns `false` if the timer was not running.
    pub fn expire(&mut self) -> bool {
        self.armed.take().is_some()
    }
}

impl Timer for SimTimer {
    fn arm(&mut self, ticks: u32) {
        self.armed = Some(ticks);
        self.history.push(TimerOp::Arm(ticks));
    }

    fn cancel(&mut self) {
        self.armed = None;
        self.history.push(TimerOp::Cancel);
    }
}

/// RTU frame as a slave would send it: address, PDU, CRC
pub fn rtu_frame(responder: u8, pdu: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(pdu.len() + 3);
    frame.push(responder);
    frame.extend_from_slice(pdu);
    let crc = RtuFraming::crc(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}
