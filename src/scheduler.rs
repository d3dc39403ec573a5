//! Polling Scheduler — a single long-running task that refreshes the cache
//! at deterministic cadences. Discrete outputs are never polled; the
//! cache-side output value is always whatever a client last wrote through
//! the adapter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cache::IoCache;
use crate::clock::CoreClock;
use crate::config::CoreConfig;
use crate::dal::{self, SharedBus};

const YIELD_INTERVAL: Duration = Duration::from_millis(5);

pub struct PollingScheduler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PollingScheduler {
    /// Spawns the polling thread and returns a handle. Only this loop (and,
    /// for outputs, the adapter's write path) may call into `bus`.
    pub fn start(cache: Arc<IoCache>, bus: SharedBus, clock: CoreClock, config: CoreConfig) -> PollingScheduler {
        let stop = Arc::new(AtomicBool::new(false));
        let loop_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("io-poll".into())
            .spawn(move || {
                if let Some(core_id) = config.polling_core_id {
                    pin_to_core(core_id);
                }
                raise_priority();

                let mut last_inputs = 0u64;
                let mut last_adc = 0u64;
                loop {
                    if loop_stop.load(Ordering::Relaxed) {
                        break;
                    }
                    if cache.clock_fault() {
                        log::error!("polling scheduler observed a clock fault, exiting (fatal)");
                        break;
                    }

                    let now = clock.now_ms();

                    if now.saturating_sub(last_inputs) >= config.inputs_poll_ms {
                        let word = bus.lock().read_discrete_inputs();
                        cache.update_inputs(word, now);
                        last_inputs = now;
                    }

                    if now.saturating_sub(last_adc) >= config.adc_poll_ms {
                        let mut values = [None; 4];
                        {
                            let mut bus = bus.lock();
                            for (channel, slot) in values.iter_mut().enumerate() {
                                let raw = bus.read_adc_raw(channel as u8);
                                // Kind-1 transient bus error: skip this channel
                                // rather than publish the fault sentinel as a
                                // validated reading indistinguishable from a
                                // real full-scale code.
                                *slot = if raw == dal::ADC_FAULT_SENTINEL {
                                    log::debug!("ADC channel {} returned fault sentinel, skipping", channel);
                                    None
                                } else {
                                    Some(raw)
                                };
                            }
                        }
                        cache.update_all_adc(values, now);
                        last_adc = now;
                    }

                    thread::sleep(YIELD_INTERVAL);
                }
                log::info!("polling scheduler stopped");
            })
            .expect("failed to spawn polling thread");

        PollingScheduler { stop, handle: Some(handle) }
    }

    /// Cooperative shutdown: sets the stop flag and waits for the next loop
    /// top to observe it. There is no preemption.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "linux")]
fn pin_to_core(core_id: usize) {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core_id, &mut set);
        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if result != 0 {
            log::warn!(
                "failed to pin polling thread to core {}: {}",
                core_id,
                std::io::Error::last_os_error(),
            );
        } else {
            log::debug!("polling thread pinned to core {}", core_id);
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(core_id: usize) {
    log::debug!("core affinity (core {}) is not supported on this platform", core_id);
}

#[cfg(target_os = "linux")]
fn raise_priority() {
    unsafe {
        let params = libc::sched_param { sched_priority: 1 };
        let result = libc::sched_setscheduler(0, libc::SCHED_FIFO, &params);
        if result != 0 {
            log::debug!(
                "could not raise polling thread to SCHED_FIFO (requires privileges): {}",
                std::io::Error::last_os_error(),
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn raise_priority() {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dal::{self, FakeBus};

    #[test]
    fn test_scheduler_populates_cache() {
        let clock = CoreClock::start();
        let cache = Arc::new(IoCache::new(clock.clone(), 5, 20));
        let (bus, handle) = FakeBus::new();
        handle.set_inputs(0x00FF);
        handle.set_adc(0, 2048);

        let config = CoreConfig {
            inputs_poll_ms: 5,
            adc_poll_ms: 10,
            ..CoreConfig::default()
        };
        let mut scheduler = PollingScheduler::start(cache.clone(), dal::shared(bus), clock, config);

        thread::sleep(Duration::from_millis(100));
        scheduler.stop();

        let (value, src, srv) = cache.get_inputs();
        assert_eq!(value, 0x00FF);
        assert!(src > 0);
        assert!(srv >= src);

        let (adc_value, adc_src, _) = cache.get_adc(0).unwrap();
        assert_eq!(adc_value, 2048);
        assert!(adc_src > 0);
    }

    #[test]
    fn test_stop_is_observed_promptly() {
        let clock = CoreClock::start();
        let cache = Arc::new(IoCache::new(clock.clone(), 5, 20));
        let (bus, _handle) = FakeBus::new();
        let mut scheduler = PollingScheduler::start(cache, dal::shared(bus), clock, CoreConfig::default());
        scheduler.stop();
        assert!(scheduler.handle.is_none());
    }
}
