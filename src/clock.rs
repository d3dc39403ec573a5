//! Monotonic millisecond clock, relative to an epoch captured at process start.
//!
//! Every timestamp in the cache and the adapter is measured against this
//! clock rather than wall-clock time: `source_timestamp_ms` and
//! `server_timestamp_ms` are defined as "monotonic millisecond clock since
//! process start" (the wire adapter is the only place that ever converts to
//! wall-clock epoch seconds, and only for the outgoing OPC UA timestamp).

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CoreClock {
    epoch: Instant,
}

impl CoreClock {
    pub fn start() -> CoreClock {
        CoreClock { epoch: Instant::now() }
    }

    /// Milliseconds elapsed since this clock was started.
    ///
    /// Guaranteed non-decreasing across calls on the same `CoreClock`,
    /// because `Instant::now()` never moves backwards relative to an earlier
    /// `Instant` on the same clock source. A caller that observes a
    /// decrease has hit the fatal condition in the error taxonomy (kind 6)
    /// and should treat it as a clock fault, not retry.
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl Default for CoreClock {
    fn default() -> Self {
        CoreClock::start()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_monotonic() {
        let clock = CoreClock::start();
        let t1 = clock.now_ms();
        sleep(Duration::from_millis(5));
        let t2 = clock.now_ms();
        assert!(t2 >= t1);
    }

    #[test]
    fn test_starts_near_zero() {
        let clock = CoreClock::start();
        assert!(clock.now_ms() < 50);
    }
}
