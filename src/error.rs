//! Error types for Modbus master operations.

use crate::types::{Fault, Mode};
use thiserror::Error;

/// Result type alias for master operations.
pub type Result<T> = std::result::Result<T, MasterError>;

/// Error types for the serial line master.
#[derive(Error, Debug)]
pub enum MasterError {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected at init
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Communication mode accepted by the configuration but not implemented
    #[error("Unsupported communication mode: {0:?}")]
    UnsupportedMode(Mode),

    /// Baudrate outside the supported set
    #[error("Unsupported baudrate: {0}")]
    UnsupportedBaudrate(u32),

    /// Request payload does not fit in a single ADU
    #[error("Payload too long: {length} bytes (max 253)")]
    PayloadTooLong {
        /// Length of the rejected payload
        length: usize,
    },

    /// Engine used before `init`
    #[error("Master not initialized")]
    NotInitialized,

    /// An impossible state combination was detected; processing stopped
    #[error("Unrecoverable fault: {0}")]
    Fault(Fault),

    /// Engine already stopped by an earlier fault
    #[error("Master halted after fault: {0}")]
    Halted(Fault),
}

impl MasterError {
    /// Whether the error leaves the engine permanently stopped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MasterError::Fault(_) | MasterError::Halted(_))
    }
}
