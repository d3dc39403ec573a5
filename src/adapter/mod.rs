//! Variable Adapter — binds the cache and the DAL to a protocol server's
//! variable registry. [`VariableKind`] is the closed set of node variants
//! the spec's redesign note calls for in place of function-pointer
//! callbacks with opaque context pointers; [`VariableTable`] maps the seven
//! string identifiers of [`crate::node_id`] to a kind and an access level,
//! and supplies the read/write dispatch every protocol binding (see
//! [`crate::opcua_binding`] when the `server` feature is enabled) calls
//! through.

use std::sync::Arc;

use bitflags::bitflags;

use crate::cache::IoCache;
use crate::clock::CoreClock;
use crate::dal::SharedBus;
use crate::diagnostics::Diagnostics;
use crate::node_id;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    InputWord,
    OutputWord,
    AdcChannel(u8),
    Counter,
    LoopbackIn,
    LoopbackOut,
}

/// A scalar value crossing the adapter boundary. Anything other than
/// `U16` on a write is, by definition, not the 16-bit unsigned scalar the
/// protocol declared the node as: a type-mismatch condition (spec error
/// kind 4), never a panic and never a pass-through to the DAL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue {
    U16(u16),
    Boolean(bool),
    Int32(i32),
    Double(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterFault {
    TypeMismatch,
    BadValue,
    NotWritable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    pub value: u16,
    pub source_timestamp_ms: Option<u64>,
}

pub type ReadOutcome = Result<ReadResult, AdapterFault>;

pub struct VariableTable {
    cache: Arc<IoCache>,
    bus: SharedBus,
    diagnostics: Arc<Diagnostics>,
    clock: CoreClock,
    entries: Vec<(&'static str, VariableKind, Access)>,
}

impl VariableTable {
    pub fn new(cache: Arc<IoCache>, bus: SharedBus, diagnostics: Arc<Diagnostics>, clock: CoreClock) -> VariableTable {
        let entries = vec![
            (node_id::DISCRETE_INPUTS, VariableKind::InputWord, Access::READ),
            (node_id::DISCRETE_OUTPUTS, VariableKind::OutputWord, Access::READ.union(Access::WRITE)),
            (node_id::ADC_CHANNEL[0], VariableKind::AdcChannel(0), Access::READ),
            (node_id::ADC_CHANNEL[1], VariableKind::AdcChannel(1), Access::READ),
            (node_id::ADC_CHANNEL[2], VariableKind::AdcChannel(2), Access::READ),
            (node_id::ADC_CHANNEL[3], VariableKind::AdcChannel(3), Access::READ),
            (node_id::DIAGNOSTIC_COUNTER, VariableKind::Counter, Access::READ),
            (node_id::LOOPBACK_INPUT, VariableKind::LoopbackIn, Access::READ.union(Access::WRITE)),
            (node_id::LOOPBACK_OUTPUT, VariableKind::LoopbackOut, Access::READ),
        ];
        VariableTable { cache, bus, diagnostics, clock, entries }
    }

    pub fn entries(&self) -> &[(&'static str, VariableKind, Access)] {
        &self.entries
    }

    /// Reads never block on hardware: the cache read path is at most one
    /// bounded mutex acquisition, and the counter/loopback paths never
    /// suspend at all.
    pub fn read(&self, kind: VariableKind) -> ReadOutcome {
        match kind {
            VariableKind::InputWord => Ok(from_sample(self.cache.get_inputs())),
            VariableKind::OutputWord => Ok(from_sample(self.cache.get_outputs())),
            VariableKind::AdcChannel(channel) => match self.cache.get_adc(channel) {
                Some(sample) => Ok(from_sample(sample)),
                None => Err(AdapterFault::BadValue),
            },
            VariableKind::Counter => Ok(ReadResult {
                value: self.diagnostics.read_counter(),
                source_timestamp_ms: Some(self.clock.now_ms()),
            }),
            VariableKind::LoopbackIn => Ok(ReadResult {
                value: self.diagnostics.read_loopback_input(),
                source_timestamp_ms: None,
            }),
            VariableKind::LoopbackOut => Ok(ReadResult {
                value: self.diagnostics.read_loopback_output(),
                source_timestamp_ms: None,
            }),
        }
    }

    /// Writes to `discrete_outputs` may block for a few milliseconds inside
    /// the DAL; the cache lock is acquired only for the brief update step
    /// that follows, never held across the DAL call.
    pub fn write(&self, kind: VariableKind, value: WireValue) -> Result<(), AdapterFault> {
        match kind {
            VariableKind::OutputWord => {
                let word = expect_u16(value)?;
                self.bus.lock().write_discrete_outputs(word);
                self.cache.update_outputs(word, self.clock.now_ms());
                Ok(())
            }
            VariableKind::LoopbackIn => {
                let word = expect_u16(value)?;
                self.diagnostics.write_loopback_input(word);
                Ok(())
            }
            VariableKind::InputWord
            | VariableKind::AdcChannel(_)
            | VariableKind::Counter
            | VariableKind::LoopbackOut => Err(AdapterFault::NotWritable),
        }
    }
}

fn expect_u16(value: WireValue) -> Result<u16, AdapterFault> {
    match value {
        WireValue::U16(word) => Ok(word),
        _ => Err(AdapterFault::TypeMismatch),
    }
}

fn from_sample((value, source_timestamp_ms, _server_timestamp_ms): crate::cache::Sample) -> ReadResult {
    ReadResult {
        value,
        source_timestamp_ms: if source_timestamp_ms != 0 { Some(source_timestamp_ms) } else { None },
    }
}

/// Converts a monotonic-millisecond source timestamp into the protocol's
/// wall-clock epoch representation. Spec.md §6 is literal here: divide by
/// 1000 and treat the result as seconds since the conventional epoch,
/// losing sub-second precision and *not* adding any wall-clock offset —
/// the conversion is preserved exactly as specified, oddity and all.
/// The cache's `server_timestamp_ms` is never surfaced this way; it exists
/// only for internal staleness checks.
pub fn to_wire_epoch_seconds(source_timestamp_ms: u64) -> u64 {
    source_timestamp_ms / 1000
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dal::{self, FakeBus};

    fn table() -> (VariableTable, dal::FakeBusHandle) {
        let clock = CoreClock::start();
        let cache = Arc::new(IoCache::new(clock.clone(), 5, 20));
        let (bus, handle) = FakeBus::new();
        let diagnostics = Arc::new(Diagnostics::new());
        (VariableTable::new(cache, dal::shared(bus), diagnostics, clock), handle)
    }

    #[test]
    fn test_cold_start_inputs_have_no_source_timestamp() {
        let (table, _handle) = table();
        let result = table.read(VariableKind::InputWord).unwrap();
        assert_eq!(result.value, 0);
        assert_eq!(result.source_timestamp_ms, None);
    }

    #[test]
    fn test_adc_not_yet_valid_is_bad_value() {
        let (table, _handle) = table();
        assert_eq!(table.read(VariableKind::AdcChannel(0)), Err(AdapterFault::BadValue));
    }

    #[test]
    fn test_out_of_range_adc_index_is_bad_value_not_crash() {
        let (table, _handle) = table();
        assert_eq!(table.read(VariableKind::AdcChannel(4)), Err(AdapterFault::BadValue));
    }

    #[test]
    fn test_write_then_read_discrete_outputs_round_trips() {
        let (table, _handle) = table();
        table.write(VariableKind::OutputWord, WireValue::U16(0x0008)).unwrap();
        let result = table.read(VariableKind::OutputWord).unwrap();
        assert_eq!(result.value, 0x0008);
    }

    #[test]
    fn test_type_mismatch_write_leaves_cached_value_unchanged() {
        let (table, _handle) = table();
        table.write(VariableKind::OutputWord, WireValue::U16(0x0001)).unwrap();
        let fault = table.write(VariableKind::OutputWord, WireValue::Boolean(true));
        assert_eq!(fault, Err(AdapterFault::TypeMismatch));
        assert_eq!(table.read(VariableKind::OutputWord).unwrap().value, 0x0001);
    }

    #[test]
    fn test_read_only_nodes_reject_writes() {
        let (table, _handle) = table();
        assert_eq!(table.write(VariableKind::InputWord, WireValue::U16(1)), Err(AdapterFault::NotWritable));
        assert_eq!(table.write(VariableKind::AdcChannel(0), WireValue::U16(1)), Err(AdapterFault::NotWritable));
        assert_eq!(table.write(VariableKind::Counter, WireValue::U16(1)), Err(AdapterFault::NotWritable));
        assert_eq!(table.write(VariableKind::LoopbackOut, WireValue::U16(1)), Err(AdapterFault::NotWritable));
    }

    #[test]
    fn test_loopback_round_trip() {
        let (table, _handle) = table();
        table.write(VariableKind::LoopbackIn, WireValue::U16(0xBEEF)).unwrap();
        assert_eq!(table.read(VariableKind::LoopbackOut).unwrap().value, 0xBEEF);
    }

    #[test]
    fn test_counter_monotonic_across_reads() {
        let (table, _handle) = table();
        let v1 = table.read(VariableKind::Counter).unwrap().value;
        let v2 = table.read(VariableKind::Counter).unwrap().value;
        assert_eq!(v2, v1.wrapping_add(1));
    }

    #[test]
    fn test_entries_cover_all_seven_node_ids() {
        let (table, _handle) = table();
        let ids: Vec<&str> = table.entries().iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids.len(), 9); // discrete_inputs, discrete_outputs, 4x adc, counter, 2x loopback
        assert!(ids.contains(&node_id::DISCRETE_INPUTS));
        assert!(ids.contains(&node_id::DISCRETE_OUTPUTS));
    }

    #[test]
    fn test_wire_epoch_conversion_truncates_subsecond() {
        assert_eq!(to_wire_epoch_seconds(1999), 1);
    }
}
