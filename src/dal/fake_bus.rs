//! A software-only [`DeviceBus`] for tests and conformance scenarios.
//!
//! Lets a test drive electrical state (idle inputs, ADC codes) and inject a
//! sticky bus fault on demand, matching spec scenario §8.5 ("force the
//! discrete-input DAL to return the sticky sentinel for 500 ms").

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use super::{DeviceBus, BUS_FAULT_SENTINEL, ADC_FAULT_SENTINEL};

/// A handle a test can use to mutate a running [`FakeBus`] from another
/// thread, mirroring the lock-free `AtomicI8`-backed trigger-level handle
/// the original GUI sampler thread shares with its render thread.
#[derive(Clone)]
pub struct FakeBusHandle {
    inputs: Arc<AtomicU16>,
    adc: Arc<[AtomicU16; 4]>,
    input_fault: Arc<AtomicBool>,
}

impl FakeBusHandle {
    pub fn set_inputs(&self, word: u16) {
        self.inputs.store(word, Ordering::Relaxed);
    }

    pub fn set_adc(&self, channel: usize, raw: u16) {
        self.adc[channel].store(raw, Ordering::Relaxed);
    }

    pub fn set_input_fault(&self, fault: bool) {
        self.input_fault.store(fault, Ordering::Relaxed);
    }
}

pub struct FakeBus {
    inputs: Arc<AtomicU16>,
    outputs: u16,
    adc: Arc<[AtomicU16; 4]>,
    input_fault: Arc<AtomicBool>,
    safe_state_writes: u32,
}

impl FakeBus {
    pub fn new() -> (FakeBus, FakeBusHandle) {
        let inputs = Arc::new(AtomicU16::new(0));
        let adc = Arc::new([AtomicU16::new(0), AtomicU16::new(0), AtomicU16::new(0), AtomicU16::new(0)]);
        let input_fault = Arc::new(AtomicBool::new(false));
        let handle = FakeBusHandle {
            inputs: inputs.clone(),
            adc: adc.clone(),
            input_fault: input_fault.clone(),
        };
        (FakeBus { inputs, outputs: 0, adc, input_fault, safe_state_writes: 0 }, handle)
    }

    pub fn outputs(&self) -> u16 {
        self.outputs
    }

    pub fn safe_state_writes(&self) -> u32 {
        self.safe_state_writes
    }
}

impl DeviceBus for FakeBus {
    fn read_discrete_inputs(&mut self) -> u16 {
        if self.input_fault.load(Ordering::Relaxed) {
            return BUS_FAULT_SENTINEL;
        }
        self.inputs.load(Ordering::Relaxed)
    }

    fn write_discrete_outputs(&mut self, word: u16) {
        self.outputs = word;
    }

    fn read_adc_raw(&mut self, channel: u8) -> u16 {
        match self.adc.get(channel as usize) {
            Some(cell) => cell.load(Ordering::Relaxed),
            None => ADC_FAULT_SENTINEL,
        }
    }

    fn write_all_outputs_safe(&mut self) -> bool {
        self.outputs = 0x0000;
        self.safe_state_writes += 1;
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_idle_inputs_read_zero() {
        let (mut bus, _handle) = FakeBus::new();
        assert_eq!(bus.read_discrete_inputs(), 0x0000);
    }

    #[test]
    fn test_handle_mutates_inputs() {
        let (mut bus, handle) = FakeBus::new();
        handle.set_inputs(0x1234);
        assert_eq!(bus.read_discrete_inputs(), 0x1234);
    }

    #[test]
    fn test_injected_fault_returns_sentinel() {
        let (mut bus, handle) = FakeBus::new();
        handle.set_input_fault(true);
        assert_eq!(bus.read_discrete_inputs(), BUS_FAULT_SENTINEL);
        handle.set_input_fault(false);
        assert_eq!(bus.read_discrete_inputs(), 0x0000);
    }

    #[test]
    fn test_safe_state_write_zeroes_outputs() {
        let (mut bus, _handle) = FakeBus::new();
        bus.write_discrete_outputs(0xABCD);
        assert!(bus.write_all_outputs_safe());
        assert_eq!(bus.outputs(), 0x0000);
        assert_eq!(bus.safe_state_writes(), 1);
    }
}
