//! Production [`DeviceBus`](super::DeviceBus) backed by I2C-attached parallel
//! port expanders and a 4-channel ADC.
//!
//! The concrete I2C/SPI transaction protocol for any given expander or
//! converter chip is a vendor driver concern and stays out of scope here;
//! this module is generic over three small blocking traits it owns, in the
//! same spirit as `embedded-hal`'s blocking I2C traits.

use std::fmt;

use super::{DeviceBus, BUS_FAULT_SENTINEL, ADC_FAULT_SENTINEL};

/// One 8-bit I2C input port expander.
pub trait InputExpander {
    type Error: fmt::Debug;

    /// Reads the raw (not yet inverted) byte off the bus.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;
}

/// One 8-bit I2C output port expander.
pub trait OutputExpander {
    type Error: fmt::Debug;

    /// Writes the raw (not yet inverted) byte to the bus.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
}

/// A 4-channel analog-to-digital converter.
pub trait AdcConverter {
    type Error: fmt::Debug;

    /// Samples the electrical pin mapped to `channel` and returns a raw
    /// right-justified 12-bit code.
    fn read_channel(&mut self, channel: u8) -> Result<u16, Self::Error>;
}

/// Fixed channel-index-to-electrical-pin lookup table owned by the DAL.
/// Callers of [`DeviceBus::read_adc_raw`] use indices `0..4` only; this
/// table is the one place that maps those to the converter's own pin
/// numbering.
const ADC_PIN_MAP: [u8; 4] = [0, 1, 2, 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    NotInit,
    Ready,
    Failed,
}

#[derive(Debug)]
pub struct I2cExpanderBus<I1, I2, O1, O2, A> {
    input1: I1,
    input2: I2,
    output1: O1,
    output2: O2,
    adc: A,
    init: InitState,
}

impl<I1, I2, O1, O2, A> I2cExpanderBus<I1, I2, O1, O2, A>
where
    I1: InputExpander,
    I2: InputExpander,
    O1: OutputExpander,
    O2: OutputExpander,
    A: AdcConverter,
{
    pub fn new(input1: I1, input2: I2, output1: O1, output2: O2, adc: A) -> Self {
        I2cExpanderBus { input1, input2, output1, output2, adc, init: InitState::NotInit }
    }

    /// Performs bring-up bus setup and the safe-state write exactly once.
    /// Init failure is sticky: every discrete I/O or ADC operation returns
    /// the failure sentinel on every subsequent call until process restart.
    fn ensure_init(&mut self) {
        match self.init {
            InitState::Ready | InitState::Failed => return,
            InitState::NotInit => {}
        }
        log::debug!("DAL: performing lazy bring-up, driving all outputs to de-energised state");
        match (self.output1.write_byte(0xFF), self.output2.write_byte(0xFF)) {
            (Ok(()), Ok(())) => {
                self.init = InitState::Ready;
            }
            (r1, r2) => {
                log::error!("DAL: bring-up failed (output1: {:?}, output2: {:?})", r1, r2);
                self.init = InitState::Failed;
            }
        }
    }

    fn is_usable(&mut self) -> bool {
        self.ensure_init();
        self.init == InitState::Ready
    }
}

impl<I1, I2, O1, O2, A> DeviceBus for I2cExpanderBus<I1, I2, O1, O2, A>
where
    I1: InputExpander + Send,
    I2: InputExpander + Send,
    O1: OutputExpander + Send,
    O2: OutputExpander + Send,
    A: AdcConverter + Send,
{
    fn read_discrete_inputs(&mut self) -> u16 {
        if !self.is_usable() {
            return BUS_FAULT_SENTINEL;
        }
        match (self.input1.read_byte(), self.input2.read_byte()) {
            (Ok(low), Ok(high)) => {
                // Active-low wiring: invert so bit=1 means "signal present".
                let word = (!low) as u16 | ((!high) as u16) << 8;
                log::trace!("read_discrete_inputs() = {:#06x}", word);
                word
            }
            (low, high) => {
                log::debug!("DAL: transient input read failure (low: {:?}, high: {:?})", low, high);
                BUS_FAULT_SENTINEL
            }
        }
    }

    fn write_discrete_outputs(&mut self, word: u16) {
        if !self.is_usable() {
            // Sticky failure: attempt the write anyway, it may recover the bus.
            log::debug!("DAL: write attempted while bus is in failed state");
        }
        let low = (word & 0xFF) as u8;
        let high = ((word >> 8) & 0xFF) as u8;
        if let Err(error) = self.output1.write_byte(!low) {
            log::debug!("DAL: output1 write failed: {:?}", error);
        }
        if let Err(error) = self.output2.write_byte(!high) {
            log::debug!("DAL: output2 write failed: {:?}", error);
        }
        log::trace!("write_discrete_outputs({:#06x})", word);
    }

    fn read_adc_raw(&mut self, channel: u8) -> u16 {
        if !self.is_usable() {
            return ADC_FAULT_SENTINEL;
        }
        let Some(&pin) = ADC_PIN_MAP.get(channel as usize) else {
            log::debug!("DAL: out-of-range ADC channel index {}", channel);
            return ADC_FAULT_SENTINEL;
        };
        match self.adc.read_channel(pin) {
            Ok(code) => {
                log::trace!("read_adc_raw({}) = {}", channel, code);
                code
            }
            Err(error) => {
                log::debug!("DAL: ADC channel {} read failed: {:?}", channel, error);
                ADC_FAULT_SENTINEL
            }
        }
    }

    fn write_all_outputs_safe(&mut self) -> bool {
        // Lazy init already performs this write; calling it here makes the
        // safe-state transition explicit and idempotent for callers that
        // invoke it directly at bring-up rather than relying on the first
        // discrete I/O operation to trigger it.
        self.ensure_init();
        if self.init == InitState::Failed {
            log::error!("DAL: write_all_outputs_safe() could not reach a safe state, bus init failed");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct MockExpander { byte: u8, fail: bool }

    impl InputExpander for MockExpander {
        type Error = &'static str;
        fn read_byte(&mut self) -> Result<u8, Self::Error> {
            if self.fail { Err("bus down") } else { Ok(self.byte) }
        }
    }

    impl OutputExpander for MockExpander {
        type Error = &'static str;
        fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
            if self.fail { Err("bus down") } else { self.byte = byte; Ok(()) }
        }
    }

    #[derive(Default)]
    struct MockAdc { codes: [u16; 4] }

    impl AdcConverter for MockAdc {
        type Error = &'static str;
        fn read_channel(&mut self, channel: u8) -> Result<u16, Self::Error> {
            self.codes.get(channel as usize).copied().ok_or("bad pin")
        }
    }

    fn bus(i1: MockExpander, i2: MockExpander) -> I2cExpanderBus<MockExpander, MockExpander, MockExpander, MockExpander, MockAdc> {
        I2cExpanderBus::new(i1, i2, MockExpander::default(), MockExpander::default(), MockAdc::default())
    }

    #[test]
    fn test_inverts_and_concatenates_inputs() {
        // idle bus (active-low all asserted) reads back as all zero at the boundary
        let mut bus = bus(MockExpander { byte: 0xFF, fail: false }, MockExpander { byte: 0xFF, fail: false });
        assert_eq!(bus.read_discrete_inputs(), 0x0000);
    }

    #[test]
    fn test_bit_mapping() {
        let mut bus = bus(MockExpander { byte: 0xFE, fail: false }, MockExpander { byte: 0xFF, fail: false });
        // expander 1 bit 0 asserted (byte 0xFE inverted = 0x01) -> low byte, bit 0
        assert_eq!(bus.read_discrete_inputs(), 0x0001);
    }

    #[test]
    fn test_sticky_failure_after_bad_bringup() {
        let mut bus = bus(MockExpander { byte: 0, fail: false }, MockExpander { byte: 0, fail: false });
        bus.output1.fail = true;
        assert_eq!(bus.read_discrete_inputs(), BUS_FAULT_SENTINEL);
        // recovering the underlying expander does not un-stick the bus
        bus.output1.fail = false;
        assert_eq!(bus.read_discrete_inputs(), BUS_FAULT_SENTINEL);
    }

    #[test]
    fn test_out_of_range_adc_channel() {
        let mut bus = bus(MockExpander::default(), MockExpander::default());
        assert_eq!(bus.read_adc_raw(7), ADC_FAULT_SENTINEL);
    }

    #[test]
    fn test_write_all_outputs_safe_drives_ff() {
        let mut bus = bus(MockExpander::default(), MockExpander::default());
        assert!(bus.write_all_outputs_safe());
        assert_eq!(bus.output1.byte, 0xFF);
        assert_eq!(bus.output2.byte, 0xFF);
    }

    #[test]
    fn test_write_all_outputs_safe_fails_when_bring_up_fails() {
        let mut bus = bus(MockExpander::default(), MockExpander::default());
        bus.output1.fail = true;
        assert!(!bus.write_all_outputs_safe());
    }
}
