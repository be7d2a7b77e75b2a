//! Hardware seams: the UART used to talk to slaves and the one-shot timers.
//!
//! The engine never touches peripherals directly. Receive and expiry events
//! are delivered by calling [`Master::on_rx_event`](crate::Master::on_rx_event),
//! [`Master::on_frame_silence`](crate::Master::on_frame_silence) and
//! [`Master::on_timer_expired`](crate::Master::on_timer_expired).

use crate::error::Result;
use crate::types::LineSettings;

/// Byte-oriented serial line
pub trait Transport {
    /// Apply baudrate and character format
    fn configure(&mut self, bps: u32, line: LineSettings) -> Result<()>;

    /// Queue one byte for transmission
    fn send_byte(&mut self, byte: u8) -> Result<()>;

    /// Drive the communication activity indicator (an LED on most boards)
    fn set_activity(&mut self, _on: bool) {}
}

/// One-shot countdown timer measured in clock ticks
pub trait Timer {
    /// Start (or restart) counting down `ticks`
    fn arm(&mut self, ticks: u32);

    fn cancel(&mut self);
}
