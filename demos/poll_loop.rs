//! Poll Loop Example
//!
//! Drives a real serial line:
//! - Listing and selecting serial ports
//! - Queueing unicast and broadcast requests
//! - Running the master until every request is answered or dropped
//! - Dumping diagnostics as JSON
//!
//! Usage:
//!   cargo run --example poll_loop                  # Interactive mode
//!   cargo run --example poll_loop -- COM3          # Specify port
//!   cargo run --example poll_loop -- /dev/ttyUSB0 9600
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example poll_loop

use inquire::Select;
use log::info;
use modbus_osl_master::{
    Baudrate, Mode, Request, RequestQueue, Result, SerialMaster, SystemConfiguration,
};

/// Interactive serial port selection using inquire
fn select_port() -> Result<String> {
    let ports = SerialMaster::<RequestQueue>::list_ports()?;

    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }

    let port_names: Vec<String> = ports
        .iter()
        .map(|p| format!("{} - {:?}", p.port_name, p.port_type))
        .collect();

    let selection = Select::new("Select a serial port:", port_names)
        .prompt()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Selection cancelled: {}", e),
            )
        })?;

    // Extract just the port name (before " - ")
    let port_name = selection
        .split(" - ")
        .next()
        .unwrap_or_default()
        .to_string();
    Ok(port_name)
}

fn main() -> Result<()> {
    // Initialize logger with default info level if RUST_LOG is not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let port_name = args.next().map(Ok).unwrap_or_else(select_port)?;
    let baudrate = match args.next() {
        Some(bps) => bps.parse::<Baudrate>()?,
        None => Baudrate::default(),
    };

    let mut queue = RequestQueue::new();
    // Read two holding registers from slave 1
    queue.push(Request::new(1, vec![0x03, 0x00, 0x00, 0x00, 0x02])?);
    // Write single coil on every slave
    queue.push(Request::broadcast(vec![0x05, 0x00, 0x01, 0xFF, 0x00])?);
    // Read input registers from slave 2
    queue.push(Request::new(2, vec![0x04, 0x00, 0x10, 0x00, 0x01])?);

    info!("Opening {} at {}...", port_name, baudrate);
    let config = SystemConfiguration::new(baudrate, Mode::Rtu, 3);
    let mut bus = SerialMaster::open(&port_name, config, queue)?;
    bus.master_mut().set_debug_print(true, true);

    bus.run_until_idle()?;

    let master = bus.master();
    for response in master.app().responses() {
        info!("Reply from {}: {:02X?}", response.responder, response.pdu);
    }
    for responder in master.app().no_responses() {
        info!("No response from {}", responder);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(master.diagnostics()).unwrap_or_default()
    );

    Ok(())
}
