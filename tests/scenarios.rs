//! End-to-end exchanges driven through the simulated HAL.

use modbus_osl_master::sim::{rtu_frame, SimTimer, SimTransport};
use modbus_osl_master::*;

const F: u32 = 1000;
const READ_HOLDING: [u8; 5] = [0x03, 0x00, 0x10, 0x00, 0x02];

type SimMaster = RtuMaster<SimTransport, SimTimer, RequestQueue>;

fn started(baud: Baudrate, attempts: u8) -> SimMaster {
    let mut master = Master::new(
        SimTransport::new(),
        SimTimer::new(),
        SimTimer::new(),
        RtuFraming::new(),
        RequestQueue::new(),
    );
    master
        .init(SystemConfiguration::new(baud, Mode::Rtu, attempts).with_clock_hz(F))
        .unwrap();
    master.on_frame_silence().unwrap();
    master.poll().unwrap();
    assert_eq!(master.main_state(), MainState::Idle);
    master
}

/// Poll once to send, then let the post-emission silence elapse
fn dispatch(master: &mut SimMaster) -> Vec<u8> {
    assert!(master.poll().unwrap());
    master.on_frame_silence().unwrap();
    master.transport_mut().take_sent()
}

fn reply(master: &mut SimMaster, frame: &[u8]) {
    for &b in frame {
        master.on_rx_event(RxEvent::Byte(b)).unwrap();
    }
    master.on_frame_silence().unwrap();
}

/// Response timer runs out and the Error state is resolved by one poll
fn time_out(master: &mut SimMaster) {
    assert!(master.response_timer_mut().expire());
    master.on_timer_expired().unwrap();
    assert_eq!(master.main_state(), MainState::Error);
    master.poll().unwrap();
    assert_eq!(master.main_state(), MainState::Idle);
}

#[test]
fn unanswered_request_is_resent_verbatim() {
    let mut master = started(Baudrate::B9600, 3);
    master
        .app_mut()
        .push(Request::new(5, READ_HOLDING.to_vec()).unwrap());

    let first = dispatch(&mut master);
    assert_eq!(first, rtu_frame(5, &READ_HOLDING));
    assert_eq!(master.main_state(), MainState::WaitReply);
    assert_eq!(master.response_timer().armed_ticks(), Some(F));

    time_out(&mut master);
    assert_eq!(master.attempt(), 2);
    assert!(master.resend_pending());

    let second = dispatch(&mut master);
    assert_eq!(second, first);
    assert_eq!(master.main_state(), MainState::WaitReply);
    assert!(!master.resend_pending());
    assert_eq!(master.diagnostics().retransmissions, 1);
}

#[test]
fn exhausted_attempts_report_no_response_and_move_on() {
    let mut master = started(Baudrate::B9600, 3);
    master
        .app_mut()
        .push(Request::new(5, READ_HOLDING.to_vec()).unwrap());
    master
        .app_mut()
        .push(Request::new(6, vec![0x01, 0x00, 0x00, 0x00, 0x08]).unwrap());

    dispatch(&mut master);
    time_out(&mut master);
    dispatch(&mut master);
    time_out(&mut master);
    dispatch(&mut master);
    assert_eq!(master.attempt(), 3);
    time_out(&mut master);

    assert_eq!(master.app().no_responses(), &[5]);
    assert_eq!(master.attempt(), 1);
    assert!(!master.resend_pending());
    assert_eq!(master.diagnostics().no_responses, 1);

    let next = dispatch(&mut master);
    assert_eq!(next[0], 6);
    assert_eq!(master.context().expected_responder(), 6);
}

#[test]
fn single_attempt_gives_up_immediately() {
    let mut master = started(Baudrate::B19200, 1);
    master
        .app_mut()
        .push(Request::new(9, READ_HOLDING.to_vec()).unwrap());
    dispatch(&mut master);
    assert_eq!(master.response_timer().armed_ticks(), Some(F / 2));
    time_out(&mut master);
    assert_eq!(master.app().no_responses(), &[9]);
    assert!(!master.poll().unwrap());
}

#[test]
fn broadcast_waits_out_the_delay_without_retry() {
    let mut master = started(Baudrate::B1200, 3);
    master
        .app_mut()
        .push(Request::broadcast(vec![0x06, 0x00, 0x01, 0x00, 0x03]).unwrap());

    let sent = dispatch(&mut master);
    assert_eq!(sent[0], 0);
    assert_eq!(master.main_state(), MainState::Delay);
    assert_eq!(master.response_timer().armed_ticks(), Some(F * 5 / 2));

    // nothing happens until the delay elapses
    assert!(master.poll().unwrap());
    assert_eq!(master.main_state(), MainState::Delay);

    assert!(master.response_timer_mut().expire());
    master.on_timer_expired().unwrap();
    assert_eq!(master.main_state(), MainState::Idle);
    assert_eq!(master.attempt(), 1);
    assert!(!master.resend_pending());
    assert!(master.app().no_responses().is_empty());
    assert!(!master.poll().unwrap());
}

#[test]
fn bytes_during_broadcast_delay_are_ignored() {
    let mut master = started(Baudrate::B9600, 3);
    master
        .app_mut()
        .push(Request::broadcast(vec![0x05, 0x00, 0x01, 0xFF, 0x00]).unwrap());
    dispatch(&mut master);

    reply(&mut master, &rtu_frame(0, &[0x05]));
    assert_eq!(master.diagnostics().discarded_bytes, 4);
    assert!(!master.processing_ready());
    assert!(master.framing_state().is_idle());
}

#[test]
fn checksum_failure_routes_to_retry() {
    let mut master = started(Baudrate::B9600, 3);
    master
        .app_mut()
        .push(Request::new(5, READ_HOLDING.to_vec()).unwrap());
    dispatch(&mut master);

    let mut corrupted = rtu_frame(5, &[0x03, 0x04, 0x00, 0x01, 0x00, 0x02]);
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;
    reply(&mut master, &corrupted);

    master.poll().unwrap();
    assert_eq!(master.main_state(), MainState::Error);
    assert_eq!(master.frame_validity(), FrameValidity::Ok);
    assert_eq!(master.attempt(), 1);
    assert!(!master.response_timer().is_armed());
    assert!(master.app().responses().is_empty());

    master.poll().unwrap();
    assert_eq!(master.main_state(), MainState::Idle);
    assert_eq!(master.attempt(), 2);
    assert!(master.resend_pending());
}

#[test]
fn parity_error_rejects_otherwise_valid_reply() {
    let mut master = started(Baudrate::B9600, 3);
    master
        .app_mut()
        .push(Request::new(5, READ_HOLDING.to_vec()).unwrap());
    dispatch(&mut master);

    master.on_rx_event(RxEvent::ParityError).unwrap();
    reply(&mut master, &rtu_frame(5, &[0x03, 0x02, 0x00, 0x07]));
    master.poll().unwrap();

    assert_eq!(master.main_state(), MainState::Error);
    assert_eq!(master.frame_validity(), FrameValidity::Ok);
    assert_eq!(master.diagnostics().checksum_failures, 1);
}

#[test]
fn reply_from_other_responder_is_ignored() {
    let mut master = started(Baudrate::B9600, 3);
    master
        .app_mut()
        .push(Request::new(5, READ_HOLDING.to_vec()).unwrap());
    dispatch(&mut master);

    reply(&mut master, &rtu_frame(6, &[0x03, 0x02, 0x00, 0x07]));
    master.poll().unwrap();

    assert_eq!(master.main_state(), MainState::WaitReply);
    assert_eq!(master.attempt(), 1);
    assert!(master.response_timer().is_armed());
    assert!(master.app().responses().is_empty());
    assert_eq!(master.diagnostics().responder_mismatches, 1);

    // the right responder can still answer
    reply(&mut master, &rtu_frame(5, &[0x03, 0x02, 0x00, 0x07]));
    master.poll().unwrap();
    assert_eq!(master.main_state(), MainState::Idle);
    assert_eq!(
        master.app().responses(),
        &[Response {
            responder: 5,
            pdu: vec![0x03, 0x02, 0x00, 0x07]
        }]
    );
}

/// A parity error on a dropped frame is not cleared when the next frame
/// starts, so it still rejects the following, valid reply.
#[test]
fn stale_parity_verdict_carries_into_next_frame() {
    let mut master = started(Baudrate::B9600, 3);
    master
        .app_mut()
        .push(Request::new(5, READ_HOLDING.to_vec()).unwrap());
    dispatch(&mut master);

    master.on_rx_event(RxEvent::ParityError).unwrap();
    reply(&mut master, &rtu_frame(6, &[0x03, 0x02, 0x00, 0x07]));
    master.poll().unwrap();
    assert_eq!(master.main_state(), MainState::WaitReply);
    assert_eq!(master.frame_validity(), FrameValidity::Nok);

    reply(&mut master, &rtu_frame(5, &[0x03, 0x02, 0x00, 0x07]));
    master.poll().unwrap();
    assert_eq!(master.main_state(), MainState::Error);
    assert_eq!(master.frame_validity(), FrameValidity::Ok);
    assert!(master.app().responses().is_empty());
}

#[test]
fn timer_expiry_while_idle_halts_for_good() {
    let mut master = started(Baudrate::B9600, 3);
    master
        .app_mut()
        .push(Request::new(5, READ_HOLDING.to_vec()).unwrap());

    let err = master.on_timer_expired().unwrap_err();
    assert!(matches!(
        err,
        MasterError::Fault(Fault::UnexpectedTimerExpiry(MainState::Idle))
    ));
    assert!(err.is_fatal());
    assert!(master.is_halted());

    assert!(matches!(master.poll(), Err(MasterError::Halted(_))));
    assert!(matches!(master.on_timer_expired(), Err(MasterError::Halted(_))));
    assert!(matches!(
        master.on_rx_event(RxEvent::Byte(5)),
        Err(MasterError::Halted(_))
    ));
    assert!(matches!(master.on_frame_silence(), Err(MasterError::Halted(_))));

    assert_eq!(master.main_state(), MainState::Idle);
    assert_eq!(master.app().pending(), 1);
    assert!(master.transport().sent().is_empty());
}

#[test]
fn activity_indicator_pulses_around_transmission() {
    let mut master = started(Baudrate::B9600, 3);
    master
        .app_mut()
        .push(Request::new(5, READ_HOLDING.to_vec()).unwrap());
    dispatch(&mut master);
    assert_eq!(master.transport().activity_pulses(), 1);
    assert!(!master.transport().activity());
}

#[test]
fn several_requests_complete_in_order() {
    let mut master = started(Baudrate::B4800, 2);
    for responder in [1u8, 2, 3] {
        master
            .app_mut()
            .push(Request::new(responder, READ_HOLDING.to_vec()).unwrap());
    }

    for responder in [1u8, 2, 3] {
        let sent = dispatch(&mut master);
        assert_eq!(sent[0], responder);
        assert_eq!(master.response_timer().armed_ticks(), Some(2 * F));
        reply(&mut master, &rtu_frame(responder, &[0x03, 0x02, 0x00, responder]));
        master.poll().unwrap();
    }

    assert!(!master.poll().unwrap());
    let responders: Vec<u8> = master.app().responses().iter().map(|r| r.responder).collect();
    assert_eq!(responders, vec![1, 2, 3]);
    assert_eq!(master.diagnostics().frames_sent, 3);
}
