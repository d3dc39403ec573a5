//! Diagnostic Variables — a minimal, deliberately separate subsystem
//! exercised by the conformance test harness. Both the counter and the
//! loopback pair bypass the cache mutex entirely: they measure pure
//! protocol round-trip, not hardware or polling behaviour.

use std::sync::atomic::{AtomicU16, Ordering};

#[derive(Default)]
pub struct Diagnostics {
    counter: AtomicU16,
    /// Single slot backing both `loopback_input` and `loopback_output`: a
    /// write to the input side mirrors into the output side by construction,
    /// because there is only one storage location to read from.
    loopback: AtomicU16,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    /// Increments the process-wide counter and returns the new value.
    /// Modulo 2^16 wrap is permitted; concurrent callers may observe
    /// reordered values but never a gap, since the increment is a single
    /// atomic read-modify-write.
    pub fn read_counter(&self) -> u16 {
        self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Stores `word` and, atomically with the store, makes it visible to
    /// `read_loopback_output`.
    pub fn write_loopback_input(&self, word: u16) {
        self.loopback.store(word, Ordering::SeqCst);
    }

    pub fn read_loopback_input(&self) -> u16 {
        self.loopback.load(Ordering::SeqCst)
    }

    pub fn read_loopback_output(&self) -> u16 {
        self.loopback.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_counter_increments_by_one() {
        let diag = Diagnostics::new();
        let v1 = diag.read_counter();
        let v2 = diag.read_counter();
        assert_eq!(v2, v1.wrapping_add(1));
    }

    #[test]
    fn test_counter_wraps() {
        let diag = Diagnostics { counter: AtomicU16::new(u16::MAX), loopback: AtomicU16::new(0) };
        assert_eq!(diag.read_counter(), 0);
    }

    #[test]
    fn test_loopback_round_trip() {
        let diag = Diagnostics::new();
        diag.write_loopback_input(0xCAFE);
        assert_eq!(diag.read_loopback_output(), 0xCAFE);
        assert_eq!(diag.read_loopback_input(), 0xCAFE);
    }

    #[test]
    fn test_loopback_idempotent_under_repetition() {
        let diag = Diagnostics::new();
        for word in [0u16, 1, 0xFFFF, 0x1234] {
            diag.write_loopback_input(word);
            assert_eq!(diag.read_loopback_output(), word);
        }
    }
}
