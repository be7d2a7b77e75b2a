//! # Modbus OSL Master
//!
//! Master-side engine for Modbus over Serial Line. It dispatches requests to
//! one or many slaves, waits for replies within baudrate dependent windows,
//! checks inbound frames and retries or abandons requests after a bounded
//! number of attempts.
//!
//! ## Features
//!
//! - Polled main state machine fed by receive and timer events
//! - RTU framing with CRC-16/MODBUS and 3.5 character inter-frame silence
//! - Broadcast requests with a settling delay instead of a reply
//! - Bounded retries with a no-response report to the application layer
//! - Fail-stop on impossible state combinations
//! - Serial port driver for desktop use and a simulated HAL for tests
//!
//! ## Example
//!
//! ```no_run
//! use modbus_osl_master::{Baudrate, Mode, Request, RequestQueue, SerialMaster, SystemConfiguration};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut queue = RequestQueue::new();
//!     queue.push(Request::new(5, vec![0x03, 0x00, 0x00, 0x00, 0x02])?);
//!
//!     let config = SystemConfiguration::new(Baudrate::B9600, Mode::Rtu, 3);
//!     let mut bus = SerialMaster::open("/dev/ttyUSB0", config, queue)?;
//!     bus.run_until_idle()?;
//!     println!("Replies: {:?}", bus.master().app().responses());
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod flags;
pub mod framing;
pub mod hal;
pub mod protocol;
pub mod serial;
pub mod sim;
pub mod timeout;
pub mod types;

pub use app::{Application, Request, RequestQueue, Response};
pub use diagnostics::Diagnostics;
pub use error::{MasterError, Result};
pub use framing::{Framing, RtuFraming};
pub use hal::{Timer, Transport};
pub use protocol::{Master, RtuMaster};
pub use serial::{DeadlineTimer, SerialMaster, SerialTransport};
pub use timeout::TimeoutPolicy;
pub use types::*;
