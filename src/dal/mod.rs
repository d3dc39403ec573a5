//! Device Abstraction Layer — the only place that touches physical buses.
//!
//! Two implementations exist behind the [`DeviceBus`] trait: [`I2cExpanderBus`]
//! talks to the real hardware through small per-chip traits it owns, and
//! [`FakeBus`] is an in-memory stand-in used by the test suite. Only the
//! polling scheduler and the adapter's output-write path are permitted to
//! call into a `DeviceBus`; it is blocking and may take a few milliseconds,
//! so it must never be invoked directly from a network read path.

mod i2c_bus;
mod fake_bus;

pub use i2c_bus::{I2cExpanderBus, InputExpander, OutputExpander, AdcConverter};
pub use fake_bus::{FakeBus, FakeBusHandle};

/// Returned by [`DeviceBus::read_discrete_inputs`] on bus failure.
///
/// Content-identical to a legitimate all-ones reading (see spec open
/// question); the scheduler passes it through to the cache unfiltered,
/// preserving the source system's observable behaviour rather than
/// silently discarding the cycle.
pub const BUS_FAULT_SENTINEL: u16 = 0xFFFF;

/// Raw 12-bit code returned for an ADC channel that could not be sampled.
pub const ADC_FAULT_SENTINEL: u16 = 0x0FFF;

/// The bus handle shared between the polling scheduler and the adapter's
/// output-write path. A single short-lived lock per call is the Rust-typed
/// equivalent of the source contract's "no lock on the bus itself is
/// required provided callers obey the contract": the lock only ever guards
/// the span of one blocking DAL call, never a cache acquisition.
pub type SharedBus = std::sync::Arc<parking_lot::Mutex<Box<dyn DeviceBus>>>;

pub fn shared(bus: impl DeviceBus + 'static) -> SharedBus {
    std::sync::Arc::new(parking_lot::Mutex::new(Box::new(bus)))
}

pub trait DeviceBus: Send {
    /// Reads both input expanders, inverting each byte (active-low wiring),
    /// and returns expander 1 in the low byte, expander 2 in the high byte.
    /// Returns [`BUS_FAULT_SENTINEL`] on bus failure.
    fn read_discrete_inputs(&mut self) -> u16;

    /// Splits `word` into two bytes, inverts each, and writes to the two
    /// output expanders. Per-byte failures are logged; there is no retry.
    fn write_discrete_outputs(&mut self, word: u16);

    /// Returns a raw 12-bit code (`[0, 4095]`) for ADC channel `channel`
    /// (`0..=3`). Returns [`ADC_FAULT_SENTINEL`] on conversion failure.
    fn read_adc_raw(&mut self, channel: u8) -> u16;

    /// Drives all relays to the de-energised state. Called exactly once, by
    /// [`crate::IoCore::start`], at construction time.
    ///
    /// The source system performs this lazily, on whichever discrete I/O or
    /// ADC operation happens to run first; spec.md §9's redesign note calls
    /// that out as bring-up-ordering debt that should not survive a
    /// rewrite, so here it is always explicit and always first. Returns
    /// `false` if the safe state could not be reached — the one bus
    /// condition that is fatal to the core's startup (error kind 6) rather
    /// than merely sticky (kind 2).
    fn write_all_outputs_safe(&mut self) -> bool;
}
