//! The sole serialisation point between the polling side and the network
//! side. One mutex guards every entry; the lock is held only for the
//! duration of field copies, never across I/O, logging, or allocation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::CoreClock;

#[derive(Debug, Clone, Copy, Default)]
struct DiscreteEntry {
    value: u16,
    source_timestamp_ms: u64,
    server_timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct AdcEntry {
    value: u16,
    source_timestamp_ms: u64,
    server_timestamp_ms: u64,
    valid: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    inputs: DiscreteEntry,
    outputs: DiscreteEntry,
    adc: [AdcEntry; 4],
}

/// A coherent `(value, source_timestamp_ms, server_timestamp_ms)` triple.
pub type Sample = (u16, u64, u64);

pub struct IoCache {
    state: Mutex<CacheState>,
    clock: CoreClock,
    read_timeout: Duration,
    write_timeout: Duration,
    /// Set when an update would have moved a timestamp backwards — the
    /// fatal clock-non-monotonicity condition of spec invariant 5. The
    /// scheduler and adapter both refuse further writes once this trips.
    clock_fault: AtomicBool,
}

impl IoCache {
    pub fn new(clock: CoreClock, read_timeout_ms: u64, write_timeout_ms: u64) -> IoCache {
        IoCache {
            state: Mutex::new(CacheState::default()),
            clock,
            read_timeout: Duration::from_millis(read_timeout_ms),
            write_timeout: Duration::from_millis(write_timeout_ms),
            clock_fault: AtomicBool::new(false),
        }
    }

    pub fn clock_fault(&self) -> bool {
        self.clock_fault.load(Ordering::Relaxed)
    }

    pub fn get_inputs(&self) -> Sample {
        self.get_discrete(|s| &s.inputs)
    }

    pub fn get_outputs(&self) -> Sample {
        self.get_discrete(|s| &s.outputs)
    }

    fn get_discrete(&self, select: impl Fn(&CacheState) -> &DiscreteEntry) -> Sample {
        match self.state.try_lock_for(self.read_timeout) {
            Some(guard) => {
                let entry = select(&guard);
                (entry.value, entry.source_timestamp_ms, entry.server_timestamp_ms)
            }
            None => {
                log::info!("cache read timed out after {:?}", self.read_timeout);
                (0, 0, 0)
            }
        }
    }

    pub fn update_inputs(&self, word: u16, src_ts: u64) {
        self.update_discrete(word, src_ts, |s| &mut s.inputs);
    }

    pub fn update_outputs(&self, word: u16, src_ts: u64) {
        self.update_discrete(word, src_ts, |s| &mut s.outputs);
    }

    fn update_discrete(&self, word: u16, src_ts: u64, select: impl Fn(&mut CacheState) -> &mut DiscreteEntry) {
        let Some(mut guard) = self.state.try_lock_for(self.write_timeout) else {
            log::info!("cache write timed out after {:?}, update dropped", self.write_timeout);
            return;
        };
        let now = self.clock.now_ms();
        let entry = select(&mut guard);
        if !self.check_monotonic(entry.source_timestamp_ms, src_ts, entry.server_timestamp_ms, now) {
            return;
        }
        entry.value = word;
        entry.source_timestamp_ms = src_ts;
        entry.server_timestamp_ms = now;
    }

    pub fn get_adc(&self, channel: u8) -> Option<Sample> {
        if channel >= 4 {
            return None;
        }
        match self.state.try_lock_for(self.read_timeout) {
            Some(guard) => {
                let entry = &guard.adc[channel as usize];
                if entry.valid {
                    Some((entry.value, entry.source_timestamp_ms, entry.server_timestamp_ms))
                } else {
                    None
                }
            }
            None => {
                log::info!("cache read timed out after {:?}", self.read_timeout);
                Some((0, 0, 0))
            }
        }
    }

    pub fn update_adc(&self, channel: u8, value: u16, src_ts: u64) {
        if channel >= 4 {
            log::debug!("update_adc: out-of-range channel {}", channel);
            return;
        }
        let Some(mut guard) = self.state.try_lock_for(self.write_timeout) else {
            log::info!("cache write timed out after {:?}, update dropped", self.write_timeout);
            return;
        };
        let now = self.clock.now_ms();
        self.write_adc_locked(&mut guard, channel as usize, value, src_ts, now);
    }

    /// Convenience that takes the lock once and updates all four channels
    /// with the same `src_ts`, so the whole batch shares one server timestamp.
    ///
    /// `values[channel] == None` means that channel's read failed this cycle
    /// (kind-1 transient bus error, per spec error taxonomy §7): that
    /// channel's entry is left untouched rather than published as validated
    /// data, so a DAL fault sentinel never becomes an indistinguishable
    /// "real" reading.
    pub fn update_all_adc(&self, values: [Option<u16>; 4], src_ts: u64) {
        let Some(mut guard) = self.state.try_lock_for(self.write_timeout) else {
            log::info!("cache write timed out after {:?}, ADC batch update dropped", self.write_timeout);
            return;
        };
        let now = self.clock.now_ms();
        for (channel, value) in values.into_iter().enumerate() {
            match value {
                Some(value) => self.write_adc_locked(&mut guard, channel, value, src_ts, now),
                None => log::debug!("ADC channel {} read failed this cycle, update skipped", channel),
            }
        }
    }

    fn write_adc_locked(&self, guard: &mut CacheState, channel: usize, value: u16, src_ts: u64, now: u64) {
        let entry = &mut guard.adc[channel];
        if !self.check_monotonic(entry.source_timestamp_ms, src_ts, entry.server_timestamp_ms, now) {
            return;
        }
        entry.value = value;
        entry.source_timestamp_ms = src_ts;
        entry.server_timestamp_ms = now;
        entry.valid = true;
    }

    /// Invariant 5: a later update may not set a timestamp smaller than the
    /// one currently stored. Invariant 1: server time must never precede
    /// source time. Both are checked before any field is written; a
    /// violation trips the sticky clock fault instead of corrupting state.
    fn check_monotonic(&self, prev_src: u64, new_src: u64, prev_srv: u64, new_srv: u64) -> bool {
        if new_src < prev_src || new_srv < prev_srv || new_srv < new_src {
            log::error!(
                "clock non-monotonicity detected (prev_src={}, new_src={}, prev_srv={}, new_srv={})",
                prev_src, new_src, prev_srv, new_srv,
            );
            self.clock_fault.store(true, Ordering::Relaxed);
            return false;
        }
        true
    }
}
