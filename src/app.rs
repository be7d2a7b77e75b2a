//! Application layer seam and a FIFO-backed implementation.

use crate::constants::{BROADCAST_ADDRESS, MAX_PDU_LEN};
use crate::error::{MasterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Outbound request: target responder plus application PDU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub responder: u8,
    pub pdu: Vec<u8>,
}

impl Request {
    pub fn new(responder: u8, pdu: Vec<u8>) -> Result<Self> {
        if pdu.len() > MAX_PDU_LEN {
            return Err(MasterError::PayloadTooLong { length: pdu.len() });
        }
        Ok(Self { responder, pdu })
    }

    /// Request addressed to every slave
    pub fn broadcast(pdu: Vec<u8>) -> Result<Self> {
        Self::new(BROADCAST_ADDRESS, pdu)
    }

    pub fn is_broadcast(&self) -> bool {
        self.responder == BROADCAST_ADDRESS
    }
}

/// Reply accepted by the master
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub responder: u8,
    pub pdu: Vec<u8>,
}

/// Modbus application layer as seen by the master engine
pub trait Application {
    /// Next request to send, if any
    fn next_request(&mut self) -> Option<Request>;

    /// One byte of an accepted reply PDU, `index` starting at 0
    fn receive_char(&mut self, byte: u8, index: usize);

    /// Total length of the reply PDU just delivered
    fn set_received_len(&mut self, len: usize);

    /// Reply fully delivered; decode and act on it
    fn manage_response(&mut self);

    /// The request to `responder` exhausted its attempts and is dropped
    fn no_response(&mut self, responder: u8);
}

/// Application layer backed by an in-memory request queue
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: VecDeque<Request>,
    in_flight: Option<Request>,
    rx_buffer: Vec<u8>,
    rx_len: usize,
    responses: Vec<Response>,
    no_responses: Vec<u8>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: Request) {
        self.pending.push_back(request);
    }

    /// Requests not yet handed to the master
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Last request handed to the master
    pub fn in_flight(&self) -> Option<&Request> {
        self.in_flight.as_ref()
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Responders whose requests got no answer, in report order
    pub fn no_responses(&self) -> &[u8] {
        &self.no_responses
    }

    pub fn take_responses(&mut self) -> Vec<Response> {
        std::mem::take(&mut self.responses)
    }
}

impl Application for RequestQueue {
    fn next_request(&mut self) -> Option<Request> {
        let request = self.pending.pop_front()?;
        self.in_flight = Some(request.clone());
        Some(request)
    }

    fn receive_char(&mut self, byte: u8, index: usize) {
        if self.rx_buffer.len() <= index {
            self.rx_buffer.resize(index + 1, 0);
        }
        self.rx_buffer[index] = byte;
    }

    fn set_received_len(&mut self, len: usize) {
        self.rx_len = len;
    }

    fn manage_response(&mut self) {
        let responder = self.in_flight.take().map(|r| r.responder).unwrap_or_default();
        let len = self.rx_len.min(self.rx_buffer.len());
        self.responses.push(Response {
            responder,
            pdu: self.rx_buffer[..len].to_vec(),
        });
        self.rx_buffer.clear();
        self.rx_len = 0;
    }

    fn no_response(&mut self, responder: u8) {
        self.in_flight = None;
        self.no_responses.push(responder);
    }
}
