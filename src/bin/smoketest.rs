//! End-to-end conformance smoke test, run against the in-memory `FakeBus`.
//!
//! Exercises the scenarios of spec.md §8 directly against the public
//! `IoCore`/`VariableTable` API, the same "drive the real public surface
//! from a small standalone binary" idiom as the teacher's `src/bin/test.rs`.
//! Does not require the `server` feature: no OPC UA stack is involved.

use std::time::Duration;

use io_opcua_core::adapter::{AdapterFault, VariableKind, WireValue};
use io_opcua_core::dal::FakeBus;
use io_opcua_core::{CoreConfig, IoCore};

fn main() {
    env_logger::init();

    let mut failures = 0usize;
    failures += scenario("cold-start inputs", cold_start_inputs);
    failures += scenario("toggle output bit 3", toggle_output_bit);
    failures += scenario("ADC validity window", adc_validity_window);
    failures += scenario("hardware fault tolerance", hardware_fault_tolerance);
    failures += scenario("type-mismatch write", type_mismatch_write);
    failures += scenario("loopback round trip", loopback_round_trip);

    if failures == 0 {
        println!("all scenarios passed");
    } else {
        eprintln!("{} scenario(s) failed", failures);
        std::process::exit(1);
    }
}

fn scenario(name: &str, run: fn() -> Result<(), String>) -> usize {
    match run() {
        Ok(()) => {
            println!("ok   - {}", name);
            0
        }
        Err(reason) => {
            println!("FAIL - {}: {}", name, reason);
            1
        }
    }
}

fn fresh_core(config: CoreConfig) -> (IoCore, io_opcua_core::dal::FakeBusHandle) {
    let (bus, handle) = FakeBus::new();
    let core = IoCore::start(bus, config).expect("IoCore::start");
    (core, handle)
}

/// Scenario 1: idle bus at cold start reads 0x0000 with a non-zero source
/// timestamp within 100 ms.
fn cold_start_inputs() -> Result<(), String> {
    let (core, _handle) = fresh_core(CoreConfig { inputs_poll_ms: 5, ..CoreConfig::default() });
    std::thread::sleep(Duration::from_millis(100));
    let result = core.variables().read(VariableKind::InputWord).map_err(|e| format!("{:?}", e))?;
    core.shutdown();
    if result.value != 0x0000 {
        return Err(format!("expected 0x0000, got {:#06x}", result.value));
    }
    if result.source_timestamp_ms.is_none() {
        return Err("expected a non-zero source timestamp".into());
    }
    Ok(())
}

/// Scenario 2: a client write to discrete_outputs is observed immediately
/// and 200 ms later, unaffected by polling (outputs are never polled).
fn toggle_output_bit() -> Result<(), String> {
    let (core, _handle) = fresh_core(CoreConfig::default());
    core.variables()
        .write(VariableKind::OutputWord, WireValue::U16(0x0008))
        .map_err(|e| format!("{:?}", e))?;

    let immediate = core.variables().read(VariableKind::OutputWord).map_err(|e| format!("{:?}", e))?;
    if immediate.value != 0x0008 {
        core.shutdown();
        return Err(format!("immediate read mismatch: {:#06x}", immediate.value));
    }

    std::thread::sleep(Duration::from_millis(200));
    let later = core.variables().read(VariableKind::OutputWord).map_err(|e| format!("{:?}", e))?;
    core.shutdown();
    if later.value != 0x0008 {
        return Err(format!("delayed read mismatch: {:#06x}", later.value));
    }
    Ok(())
}

/// Scenario 3: ADC channel is bad-value before the first poll cycle and
/// carries a raw code once the scheduler has sampled it.
fn adc_validity_window() -> Result<(), String> {
    let (core, handle) = fresh_core(CoreConfig { adc_poll_ms: 20, ..CoreConfig::default() });
    handle.set_adc(0, 2048);

    let before = core.variables().read(VariableKind::AdcChannel(0));
    if before != Err(AdapterFault::BadValue) {
        core.shutdown();
        return Err(format!("expected bad-value before first poll, got {:?}", before));
    }

    std::thread::sleep(Duration::from_millis(150));
    let after = core.variables().read(VariableKind::AdcChannel(0)).map_err(|e| format!("{:?}", e))?;
    core.shutdown();
    if after.value > 4095 {
        return Err(format!("raw code out of range: {}", after.value));
    }
    if after.source_timestamp_ms.is_none() {
        return Err("expected a non-zero source timestamp after sampling".into());
    }
    Ok(())
}

/// Scenario 5: forcing the input DAL to return the sticky sentinel does not
/// tear anything down; the cache just holds the last valid value.
fn hardware_fault_tolerance() -> Result<(), String> {
    let (core, handle) = fresh_core(CoreConfig { inputs_poll_ms: 10, ..CoreConfig::default() });
    handle.set_inputs(0x1234);
    std::thread::sleep(Duration::from_millis(50));

    let good = core.variables().read(VariableKind::InputWord).map_err(|e| format!("{:?}", e))?;
    if good.value != 0x1234 {
        core.shutdown();
        return Err(format!("expected 0x1234 before fault, got {:#06x}", good.value));
    }

    handle.set_input_fault(true);
    std::thread::sleep(Duration::from_millis(100));
    let during_fault = core.variables().read(VariableKind::InputWord).map_err(|e| format!("{:?}", e))?;
    handle.set_input_fault(false);
    std::thread::sleep(Duration::from_millis(50));
    core.shutdown();

    if during_fault.value != 0x1234 {
        return Err(format!("expected last-known-good value during fault, got {:#06x}", during_fault.value));
    }
    Ok(())
}

/// Scenario 6: a type-mismatched write is rejected and leaves the cached
/// output unchanged.
fn type_mismatch_write() -> Result<(), String> {
    let (core, _handle) = fresh_core(CoreConfig::default());
    core.variables()
        .write(VariableKind::OutputWord, WireValue::U16(0x0001))
        .map_err(|e| format!("{:?}", e))?;

    let outcome = core.variables().write(VariableKind::OutputWord, WireValue::Boolean(true));
    let unchanged = core.variables().read(VariableKind::OutputWord).map_err(|e| format!("{:?}", e))?;
    core.shutdown();

    if outcome != Err(AdapterFault::TypeMismatch) {
        return Err(format!("expected type-mismatch, got {:?}", outcome));
    }
    if unchanged.value != 0x0001 {
        return Err(format!("cached value changed after rejected write: {:#06x}", unchanged.value));
    }
    Ok(())
}

/// Loopback law: write(loopback_input, W); read(loopback_output) == W.
fn loopback_round_trip() -> Result<(), String> {
    let (core, _handle) = fresh_core(CoreConfig::default());
    for word in [0u16, 1, 0xFFFF, 0xBEEF] {
        core.variables()
            .write(VariableKind::LoopbackIn, WireValue::U16(word))
            .map_err(|e| format!("{:?}", e))?;
        let result = core.variables().read(VariableKind::LoopbackOut).map_err(|e| format!("{:?}", e))?;
        if result.value != word {
            core.shutdown();
            return Err(format!("loopback mismatch: wrote {:#06x}, read {:#06x}", word, result.value));
        }
    }
    core.shutdown();
    Ok(())
}
