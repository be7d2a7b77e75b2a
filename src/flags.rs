//! Edge-triggered flags shared between the poll loop and event handlers.

use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot flag: raised by a producer, consumed exactly once by `take`.
///
/// `take` is a single atomic swap, so a raise landing between the test and
/// the clear of the consumer can never be lost. This is the only
/// synchronization point between the receive path and the poll loop.
#[derive(Debug, Default)]
pub struct EdgeFlag(AtomicBool);

impl EdgeFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Read and clear in one step
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_returns_activation_once() {
        let flag = EdgeFlag::new();
        flag.raise();
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn repeated_raise_is_one_activation() {
        let flag = EdgeFlag::new();
        flag.raise();
        flag.raise();
        assert!(flag.is_raised());
        assert!(flag.take());
        assert!(!flag.is_raised());
    }

    #[test]
    fn raise_from_other_thread_is_observed() {
        let flag = std::sync::Arc::new(EdgeFlag::new());
        let producer = std::sync::Arc::clone(&flag);
        std::thread::spawn(move || producer.raise()).join().unwrap();
        assert!(flag.take());
    }
}
