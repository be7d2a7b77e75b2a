//! Baudrate dependent reply and broadcast windows.
//!
//! Slower lines get longer windows so that a worst-case request, the slave's
//! processing time and its reply all fit before the master gives up.

use crate::types::Baudrate;

/// Tick counts armed on the response/broadcast timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub response_ticks: u32,
    pub broadcast_ticks: u32,
}

impl TimeoutPolicy {
    pub fn new(baudrate: Baudrate, clock_hz: u32) -> Self {
        Self {
            response_ticks: response_timeout(baudrate.bps(), clock_hz),
            broadcast_ticks: broadcast_timeout(baudrate.bps(), clock_hz),
        }
    }
}

/// Ticks to wait for a unicast reply. Unknown baudrates use the 19200 window.
pub fn response_timeout(bps: u32, clock_hz: u32) -> u32 {
    match bps {
        1200 => scale(clock_hz, 4, 1),
        2400 => scale(clock_hz, 3, 1),
        4800 => scale(clock_hz, 2, 1),
        9600 => clock_hz,
        _ => scale(clock_hz, 1, 2),
    }
}

/// Ticks the bus is left quiet after a broadcast.
pub fn broadcast_timeout(bps: u32, clock_hz: u32) -> u32 {
    match bps {
        1200 => scale(clock_hz, 5, 2),
        2400 => scale(clock_hz, 3, 2),
        4800 => scale(clock_hz, 4, 5),
        9600 => scale(clock_hz, 2, 5),
        _ => scale(clock_hz, 1, 5),
    }
}

fn scale(clock_hz: u32, num: u64, den: u64) -> u32 {
    u32::try_from(clock_hz as u64 * num / den).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const F: u32 = 50_000_000;

    #[test]
    fn response_table() {
        assert_eq!(response_timeout(1200, F), 4 * F);
        assert_eq!(response_timeout(2400, F), 3 * F);
        assert_eq!(response_timeout(4800, F), 2 * F);
        assert_eq!(response_timeout(9600, F), F);
        assert_eq!(response_timeout(19200, F), F / 2);
    }

    #[test]
    fn broadcast_table() {
        assert_eq!(broadcast_timeout(1200, F), F * 5 / 2);
        assert_eq!(broadcast_timeout(2400, F), F * 3 / 2);
        assert_eq!(broadcast_timeout(4800, F), F * 4 / 5);
        assert_eq!(broadcast_timeout(9600, F), F * 2 / 5);
        assert_eq!(broadcast_timeout(19200, F), F / 5);
    }

    #[test]
    fn unknown_baudrates_use_fastest_bucket() {
        assert_eq!(response_timeout(115200, F), F / 2);
        assert_eq!(broadcast_timeout(38400, F), F / 5);
    }

    #[test]
    fn large_clocks_saturate() {
        assert_eq!(response_timeout(1200, u32::MAX), u32::MAX);
    }

    #[test]
    fn policy_from_baudrate() {
        let policy = TimeoutPolicy::new(Baudrate::B1200, 1000);
        assert_eq!(policy.response_ticks, 4000);
        assert_eq!(policy.broadcast_ticks, 2500);
    }
}
