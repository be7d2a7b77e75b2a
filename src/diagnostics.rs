//! Traffic counters kept by the master.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Running counters, reset by `init`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub frames_sent: u64,
    pub retransmissions: u64,
    pub responses_accepted: u64,
    pub checksum_failures: u64,
    pub responder_mismatches: u64,
    pub parity_errors: u64,
    pub discarded_bytes: u64,
    pub response_timeouts: u64,
    pub broadcasts_completed: u64,
    pub no_responses: u64,
    pub last_tx: Option<DateTime<Utc>>,
    pub last_rx: Option<DateTime<Utc>>,
    pub last_no_response: Option<DateTime<Utc>>,
}

impl Diagnostics {
    pub(crate) fn record_tx(&mut self, retransmission: bool) {
        self.frames_sent += 1;
        if retransmission {
            self.retransmissions += 1;
        }
        self.last_tx = Some(Utc::now());
    }

    pub(crate) fn record_response(&mut self) {
        self.responses_accepted += 1;
        self.last_rx = Some(Utc::now());
    }

    pub(crate) fn record_no_response(&mut self) {
        self.no_responses += 1;
        self.last_no_response = Some(Utc::now());
    }

    /// Share of sent frames that were retransmissions
    pub fn retry_ratio(&self) -> f64 {
        if self.frames_sent == 0 {
            0.0
        } else {
            self.retransmissions as f64 / self.frames_sent as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_ratio() {
        let mut diag = Diagnostics::default();
        assert_eq!(diag.retry_ratio(), 0.0);
        diag.record_tx(false);
        diag.record_tx(true);
        assert_eq!(diag.frames_sent, 2);
        assert!((diag.retry_ratio() - 0.5).abs() < f64::EPSILON);
        assert!(diag.last_tx.is_some());
    }

    #[test]
    fn serializes_to_json() {
        let mut diag = Diagnostics::default();
        diag.record_no_response();
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["no_responses"], 1);
        assert!(json["last_no_response"].is_string());
        assert!(json["last_rx"].is_null());
    }
}
