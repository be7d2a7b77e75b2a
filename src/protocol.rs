use crate::app::Application;
use crate::constants::*;
use crate::diagnostics::Diagnostics;
use crate::error::{MasterError, Result};
use crate::flags::EdgeFlag;
use crate::framing::{Framing, RtuFraming};
use crate::hal::{Timer, Transport};
use crate::timeout::TimeoutPolicy;
use crate::types::*;
use log::{debug, error, info, trace, warn};

/// Master engine over the RTU framing layer
pub type RtuMaster<T, Tm, A> = Master<T, Tm, RtuFraming, A>;

/// Modbus over Serial Line master engine.
///
/// The caller polls [`Master::poll`] from its main loop. Receive events, the
/// inter-frame silence and the response/broadcast timer are reported through
/// [`Master::on_rx_event`], [`Master::on_frame_silence`] and
/// [`Master::on_timer_expired`], normally straight from the interrupt or
/// driver that observed them.
pub struct Master<T, Tm, F, A> {
    transport: T,
    response_timer: Tm,
    silence_timer: Tm,
    framing: F,
    app: A,
    config: SystemConfiguration,
    timeouts: TimeoutPolicy,
    initialized: bool,
    main_state: MainState,
    frame_validity: FrameValidity,
    processing_ready: EdgeFlag,
    forward_pending: EdgeFlag,
    context: TransmissionContext,
    diagnostics: Diagnostics,
    fault: Option<Fault>,
    print_tx: bool,
    print_rx: bool,
}

impl<T, Tm, F, A> Master<T, Tm, F, A>
where
    T: Transport,
    Tm: Timer,
    F: Framing,
    A: Application,
{
    /// Assemble an engine from its collaborators. Call [`Master::init`] before polling.
    pub fn new(transport: T, response_timer: Tm, silence_timer: Tm, framing: F, app: A) -> Self {
        let config = SystemConfiguration::default();
        Master {
            transport,
            response_timer,
            silence_timer,
            framing,
            app,
            timeouts: TimeoutPolicy::new(config.baudrate, config.clock_hz),
            config,
            initialized: false,
            main_state: MainState::Initial,
            frame_validity: FrameValidity::Ok,
            processing_ready: EdgeFlag::new(),
            forward_pending: EdgeFlag::new(),
            context: TransmissionContext::default(),
            diagnostics: Diagnostics::default(),
            fault: None,
            print_tx: false,
            print_rx: false,
        }
    }

    /// Configure the line, timers and framing layer and reset all protocol state.
    ///
    /// The engine starts in `Initial` and moves to `Idle` on the first poll
    /// after the framing layer has seen the line quiet.
    pub fn init(&mut self, config: SystemConfiguration) -> Result<()> {
        self.ensure_running()?;
        config.validate()?;

        self.processing_ready.clear();
        self.forward_pending.clear();
        self.context = TransmissionContext::default();
        self.frame_validity = FrameValidity::Ok;
        self.main_state = MainState::Initial;
        self.diagnostics = Diagnostics::default();

        self.response_timer.cancel();
        self.silence_timer.cancel();
        self.transport
            .configure(config.baudrate.bps(), config.mode.line_settings())?;

        self.timeouts = TimeoutPolicy::new(config.baudrate, config.clock_hz);
        self.framing.init(config.baudrate);
        self.silence_timer
            .arm(self.framing.inter_frame_ticks(config.clock_hz));

        info!(
            "Master initialized: {} {:?}, {} attempts, response {} ticks, broadcast {} ticks",
            config.baudrate,
            config.mode,
            config.max_attempts,
            self.timeouts.response_ticks,
            self.timeouts.broadcast_ticks
        );
        self.config = config;
        self.initialized = true;
        Ok(())
    }

    /// Enable/disable hex dumps of sent and accepted frames at debug level
    pub fn set_debug_print(&mut self, tx: bool, rx: bool) {
        self.print_tx = tx;
        self.print_rx = rx;
    }

    /// Run one step of the main state machine.
    ///
    /// Returns `Ok(false)` when idle with nothing queued and no retry pending,
    /// `Ok(true)` while there is still work in progress.
    pub fn poll(&mut self) -> Result<bool> {
        self.ensure_running()?;
        if !self.initialized {
            return Err(MasterError::NotInitialized);
        }

        match self.main_state {
            MainState::Initial => {
                if self.framing.state().is_idle() {
                    self.set_state(MainState::Idle);
                }
            }
            MainState::Idle => {
                if self.take_resend() {
                    self.resend()?;
                } else if let Some(request) = self.app.next_request() {
                    if request.pdu.len() > MAX_PDU_LEN {
                        warn!(
                            "Dropping {} byte request to responder {}, too long for one ADU",
                            request.pdu.len(),
                            request.responder
                        );
                        self.app.no_response(request.responder);
                        return Err(MasterError::PayloadTooLong {
                            length: request.pdu.len(),
                        });
                    }
                    self.output(&request.pdu, request.responder)?;
                } else {
                    return Ok(false);
                }
            }
            MainState::WaitReply => {
                if self.receive_callback() {
                    self.app.manage_response();
                    self.reset_attempts();
                    self.set_state(MainState::Idle);
                }
            }
            MainState::Error => {
                // Retry only once a late frame has drained out of the framing layer
                if self.framing.state().is_idle() {
                    // A reply completed before the timeout belongs to the abandoned wait
                    self.processing_ready.clear();
                    self.repeat_request();
                    self.set_state(MainState::Idle);
                }
            }
            MainState::Delay | MainState::Processing => {}
        }
        Ok(true)
    }

    /// Receive interrupt: admit, flag or drain one received byte.
    pub fn on_rx_event(&mut self, event: RxEvent) -> Result<()> {
        self.ensure_running()?;
        self.transport.set_activity(true);

        let admissible = self.initialized
            && matches!(self.main_state, MainState::WaitReply | MainState::Error);
        match (admissible, event) {
            (true, RxEvent::ParityError) => {
                trace!("Parity error, frame marked invalid");
                self.diagnostics.parity_errors += 1;
                self.frame_validity = FrameValidity::Nok;
            }
            (true, RxEvent::Byte(byte)) => {
                self.framing.ingest(byte);
                self.silence_timer
                    .arm(self.framing.inter_frame_ticks(self.config.clock_hz));
            }
            (false, _) => {
                self.diagnostics.discarded_bytes += 1;
            }
        }

        self.transport.set_activity(false);
        Ok(())
    }

    /// Inter-frame silence timer expired.
    pub fn on_frame_silence(&mut self) -> Result<()> {
        self.ensure_running()?;
        if self.framing.on_silence() {
            self.reception_complete();
        }
        Ok(())
    }

    /// Framing layer notification that a whole frame has been received.
    ///
    /// Frames completing outside `WaitReply` (late replies drained in `Error`)
    /// are not offered to the poll loop.
    pub fn reception_complete(&self) {
        if self.main_state == MainState::WaitReply {
            self.processing_ready.raise();
        }
    }

    /// Response/broadcast timer expired.
    pub fn on_timer_expired(&mut self) -> Result<()> {
        self.ensure_running()?;
        match self.main_state {
            MainState::WaitReply => {
                warn!(
                    "No reply from responder {} (attempt {}/{})",
                    self.context.expected_responder, self.context.attempt, self.config.max_attempts
                );
                self.diagnostics.response_timeouts += 1;
                self.set_state(MainState::Error);
                Ok(())
            }
            MainState::Delay => {
                self.diagnostics.broadcasts_completed += 1;
                self.set_state(MainState::Idle);
                Ok(())
            }
            state => Err(self.halt(Fault::UnexpectedTimerExpiry(state))),
        }
    }

    /// Read and clear the pending retransmission request
    pub fn take_resend(&mut self) -> bool {
        self.forward_pending.take()
    }

    /// Start the attempt count over for the next request
    pub fn reset_attempts(&mut self) {
        self.context.attempt = 1;
    }

    pub fn main_state(&self) -> MainState {
        self.main_state
    }

    pub fn framing_state(&self) -> FramingState {
        self.framing.state()
    }

    pub fn frame_validity(&self) -> FrameValidity {
        self.frame_validity
    }

    pub fn attempt(&self) -> u8 {
        self.context.attempt
    }

    pub fn resend_pending(&self) -> bool {
        self.forward_pending.is_raised()
    }

    pub fn processing_ready(&self) -> bool {
        self.processing_ready.is_raised()
    }

    pub fn config(&self) -> &SystemConfiguration {
        &self.config
    }

    pub fn timeouts(&self) -> TimeoutPolicy {
        self.timeouts
    }

    pub fn context(&self) -> &TransmissionContext {
        &self.context
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Fault that stopped the engine, if any
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn is_halted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn response_timer(&self) -> &Tm {
        &self.response_timer
    }

    pub fn response_timer_mut(&mut self) -> &mut Tm {
        &mut self.response_timer
    }

    pub fn silence_timer(&self) -> &Tm {
        &self.silence_timer
    }

    pub fn silence_timer_mut(&mut self) -> &mut Tm {
        &mut self.silence_timer
    }

    pub fn framing(&self) -> &F {
        &self.framing
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    fn ensure_running(&self) -> Result<()> {
        match self.fault {
            Some(fault) => Err(MasterError::Halted(fault)),
            None => Ok(()),
        }
    }

    fn halt(&mut self, fault: Fault) -> MasterError {
        error!("Fatal protocol fault, master halted: {}", fault);
        self.response_timer.cancel();
        self.silence_timer.cancel();
        self.fault = Some(fault);
        MasterError::Fault(fault)
    }

    fn set_state(&mut self, next: MainState) {
        trace!("{:?} -> {:?}", self.main_state, next);
        self.main_state = next;
    }

    /// Retry or give up after a timeout or a rejected reply
    fn repeat_request(&mut self) {
        if self.context.attempt < self.config.max_attempts {
            self.context.attempt += 1;
            debug!(
                "Retrying request to responder {} (attempt {}/{})",
                self.context.expected_responder, self.context.attempt, self.config.max_attempts
            );
            self.forward_pending.raise();
        } else {
            warn!(
                "Responder {} did not answer after {} attempts, request dropped",
                self.context.expected_responder, self.config.max_attempts
            );
            self.diagnostics.record_no_response();
            self.app.no_response(self.context.expected_responder);
            self.context.attempt = 1;
        }
    }

    /// Take a completed frame and check it; `true` when the reply was delivered.
    fn receive_callback(&mut self) -> bool {
        if !self.processing_ready.take() {
            return false;
        }

        let responder = self.framing.byte_at(0);
        if responder != Some(self.context.expected_responder) {
            debug!(
                "Dropping frame from {:?}, expected responder {}",
                responder, self.context.expected_responder
            );
            self.diagnostics.responder_mismatches += 1;
            return false;
        }

        self.response_timer.cancel();
        self.set_state(MainState::Processing);

        if self.frame_validity == FrameValidity::Ok && self.framing.checksum_valid() {
            self.deliver_to_app();
            self.diagnostics.record_response();
            true
        } else {
            warn!(
                "Rejected reply from responder {} (checksum or parity)",
                self.context.expected_responder
            );
            self.diagnostics.checksum_failures += 1;
            // Do not let this frame's verdict leak into the next one
            self.frame_validity = FrameValidity::Ok;
            self.set_state(MainState::Error);
            false
        }
    }

    fn deliver_to_app(&mut self) {
        let len = self.framing.frame_len();
        let mut pdu = Vec::with_capacity(len.saturating_sub(1));
        for i in 1..len {
            let byte = self.framing.byte_at(i).unwrap_or_default();
            self.app.receive_char(byte, i - 1);
            pdu.push(byte);
        }
        self.app.set_received_len(len.saturating_sub(1));

        if self.print_rx {
            debug!(
                "Received: {:02X} {}",
                self.context.expected_responder,
                format_frame(&pdu)
            );
        }
    }

    /// Mount a new ADU and send it
    fn output(&mut self, pdu: &[u8], responder: u8) -> Result<()> {
        if pdu.len() > MAX_PDU_LEN {
            return Err(MasterError::PayloadTooLong { length: pdu.len() });
        }
        self.context.adu_len = self.framing.mount_adu(pdu, responder, &mut self.context.adu);
        self.context.expected_responder = responder;
        self.send(false)
    }

    /// Send the current ADU again, byte for byte
    fn resend(&mut self) -> Result<()> {
        let pdu_len = self.context.adu_len.saturating_sub(RTU_ADU_OVERHEAD);
        let mut pdu = [0u8; MAX_PDU_LEN];
        pdu[..pdu_len].copy_from_slice(&self.context.adu[1..=pdu_len]);
        let responder = self.context.expected_responder;
        self.context.adu_len = self
            .framing
            .mount_adu(&pdu[..pdu_len], responder, &mut self.context.adu);
        self.send(true)
    }

    fn send(&mut self, retransmission: bool) -> Result<()> {
        if self.print_tx {
            debug!("Sending:  {}", format_frame(self.context.adu()));
        }

        self.transport.set_activity(true);
        for &byte in &self.context.adu[..self.context.adu_len] {
            if let Err(e) = self.transport.send_byte(byte) {
                self.transport.set_activity(false);
                // Keep the frame and try it again on the next poll
                self.forward_pending.raise();
                return Err(e);
            }
        }
        self.transport.set_activity(false);

        self.silence_timer
            .arm(self.framing.inter_frame_ticks(self.config.clock_hz));
        self.diagnostics.record_tx(retransmission);

        if self.context.is_broadcast() {
            self.response_timer.arm(self.timeouts.broadcast_ticks);
            self.set_state(MainState::Delay);
        } else {
            self.response_timer.arm(self.timeouts.response_ticks);
            self.set_state(MainState::WaitReply);
        }
        Ok(())
    }
}

/// Space separated hex bytes
pub(crate) fn format_frame(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
