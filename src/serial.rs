//! Host-side driver: a real serial port and wall-clock timers.
//!
//! [`SerialMaster`] stands in for the interrupt handlers of a microcontroller
//! build. Each [`SerialMaster::run_once`] drains the bytes the port has
//! received, fires whichever timers ran out and then polls the engine.
//! Parity errors are not reported by host serial drivers, so
//! [`RxEvent::ParityError`] is never raised from here.

use crate::app::Application;
use crate::constants::*;
use crate::error::Result;
use crate::framing::RtuFraming;
use crate::hal::{Timer, Transport};
use crate::protocol::{Master, RtuMaster};
use crate::types::{LineSettings, RxEvent, SystemConfiguration};
use log::debug;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Transport over a host serial port
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `port_name`; line parameters are applied by `configure`
    pub fn open(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, DEFAULT_BAUD_RATE)
            .timeout(Duration::from_millis(SERIAL_READ_TIMEOUT_MS))
            .open()?;
        Ok(Self { port })
    }

    /// Read whatever has already arrived, without blocking
    pub fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let ready = self.port.bytes_to_read()? as usize;
        if ready == 0 {
            return Ok(0);
        }
        let n = ready.min(buf.len());
        Ok(self.port.read(&mut buf[..n])?)
    }
}

impl Transport for SerialTransport {
    fn configure(&mut self, bps: u32, line: LineSettings) -> Result<()> {
        self.port.set_baud_rate(bps)?;
        self.port.set_data_bits(line.data_bits)?;
        self.port.set_parity(line.parity)?;
        self.port.set_stop_bits(line.stop_bits)?;
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.port.write_all(&[byte])?;
        Ok(())
    }
}

/// One-shot timer measured against `Instant`
#[derive(Debug, Clone)]
pub struct DeadlineTimer {
    clock_hz: u32,
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    pub fn new(clock_hz: u32) -> Self {
        Self {
            clock_hz: clock_hz.max(1),
            deadline: None,
        }
    }

    /// Wall-clock length of `ticks`
    pub fn ticks_to_duration(&self, ticks: u32) -> Duration {
        Duration::from_nanos(ticks as u64 * 1_000_000_000 / self.clock_hz as u64)
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// `true` once per arming, when `now` has reached the deadline
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl Timer for DeadlineTimer {
    fn arm(&mut self, ticks: u32) {
        self.deadline = Some(Instant::now() + self.ticks_to_duration(ticks));
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Engine wired to a serial port, driven from a plain loop
pub struct SerialMaster<A> {
    master: RtuMaster<SerialTransport, DeadlineTimer, A>,
}

impl<A: Application> SerialMaster<A> {
    /// Open the port and initialize the engine with `config`
    pub fn open(port_name: &str, config: SystemConfiguration, app: A) -> Result<Self> {
        let transport = SerialTransport::open(port_name)?;
        let mut master = Master::new(
            transport,
            DeadlineTimer::new(config.clock_hz),
            DeadlineTimer::new(config.clock_hz),
            RtuFraming::new(),
            app,
        );
        master.init(config)?;
        debug!("Serial master ready on {}", port_name);
        Ok(Self { master })
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        Ok(serialport::available_ports()?)
    }

    pub fn master(&self) -> &RtuMaster<SerialTransport, DeadlineTimer, A> {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut RtuMaster<SerialTransport, DeadlineTimer, A> {
        &mut self.master
    }

    /// Service received bytes and expired timers, then poll once
    pub fn run_once(&mut self) -> Result<bool> {
        let mut buf = [0u8; MAX_ADU_LEN];
        let n = self.master.transport_mut().read_available(&mut buf)?;
        for &byte in &buf[..n] {
            self.master.on_rx_event(RxEvent::Byte(byte))?;
        }

        let now = Instant::now();
        if self.master.silence_timer_mut().poll_expired(now) {
            self.master.on_frame_silence()?;
        }
        if self.master.response_timer_mut().poll_expired(now) {
            self.master.on_timer_expired()?;
        }

        self.master.poll()
    }

    /// Loop until every queued request has been answered or dropped
    pub fn run_until_idle(&mut self) -> Result<()> {
        while self.run_once()? {
            thread::sleep(Duration::from_micros(200));
        }
        Ok(())
    }
}
