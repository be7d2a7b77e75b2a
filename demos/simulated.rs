//! Simulated Bus Example
//!
//! Runs the master against an in-process slave using the simulation HAL:
//! a reply, a corrupted reply that gets retried, a silent slave that is
//! given up on, and a broadcast.
//!
//! Usage:
//!   RUST_LOG=debug cargo run --example simulated

use log::info;
use modbus_osl_master::sim::{rtu_frame, SimTimer, SimTransport};
use modbus_osl_master::{
    Baudrate, MainState, Master, Mode, Request, RequestQueue, Result, RtuFraming, RxEvent,
    SystemConfiguration,
};

type SimMaster = modbus_osl_master::RtuMaster<SimTransport, SimTimer, RequestQueue>;

/// What the simulated slave does with the next request
fn slave_reply(request: &[u8], attempt: u8) -> Option<Vec<u8>> {
    match request[0] {
        1 => Some(rtu_frame(1, &[0x03, 0x04, 0x00, 0x2A, 0x00, 0x07])),
        2 if attempt == 1 => {
            let mut frame = rtu_frame(2, &[0x03, 0x02, 0x12, 0x34]);
            frame[3] ^= 0x40;
            Some(frame)
        }
        2 => Some(rtu_frame(2, &[0x03, 0x02, 0x12, 0x34])),
        _ => None,
    }
}

fn step(master: &mut SimMaster) -> Result<bool> {
    let sent = master.transport_mut().take_sent();
    if !sent.is_empty() {
        // end of our own emission
        master.silence_timer_mut().expire();
        master.on_frame_silence()?;
        if master.main_state() == MainState::WaitReply {
            if let Some(frame) = slave_reply(&sent, master.attempt()) {
                for byte in frame {
                    master.on_rx_event(RxEvent::Byte(byte))?;
                }
                master.silence_timer_mut().expire();
                master.on_frame_silence()?;
            }
        }
    }

    let busy = master.poll()?;
    if matches!(master.main_state(), MainState::WaitReply | MainState::Delay)
        && !master.processing_ready()
        && master.transport().sent().is_empty()
        && master.response_timer_mut().expire()
    {
        master.on_timer_expired()?;
    }
    Ok(busy)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut queue = RequestQueue::new();
    queue.push(Request::new(1, vec![0x03, 0x00, 0x00, 0x00, 0x02])?);
    queue.push(Request::new(2, vec![0x03, 0x00, 0x05, 0x00, 0x01])?);
    queue.push(Request::new(7, vec![0x03, 0x00, 0x00, 0x00, 0x01])?);
    queue.push(Request::broadcast(vec![0x06, 0x00, 0x01, 0x00, 0x03])?);

    let mut master = Master::new(
        SimTransport::new(),
        SimTimer::new(),
        SimTimer::new(),
        RtuFraming::new(),
        queue,
    );
    master.init(SystemConfiguration::new(Baudrate::B9600, Mode::Rtu, 3))?;
    master.set_debug_print(true, true);
    master.silence_timer_mut().expire();
    master.on_frame_silence()?;

    while step(&mut master)? {}

    for response in master.app().responses() {
        info!("Reply from {}: {:02X?}", response.responder, response.pdu);
    }
    info!("No response from: {:?}", master.app().no_responses());
    info!("{:#?}", master.diagnostics());
    Ok(())
}
