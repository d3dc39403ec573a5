//! Thin translation from [`VariableTable`] entries to a real OPC UA address
//! space, built on the `opcua` crate's server implementation.
//!
//! This module is the one piece of the crate not specified by spec.md: the
//! binary protocol stack, session/subscription machinery and socket bring-up
//! are the declared-out-of-scope external collaborator (spec.md §1). What
//! lives here is only the glue spec.md §6 describes — node identifiers,
//! scalar type, access level, a read callback and an optional write
//! callback per variable, plus the wire-epoch timestamp conversion — wired
//! onto one concrete stack so the crate is runnable end to end. Feature
//! gated behind `server`, exactly as the teacher gates its windowing/GUI
//! stack behind the `gui` feature, so the library and its test suite build
//! without ever pulling in `opcua`.

use std::sync::Arc;

use opcua::server::prelude::*;
use opcua::sync::Mutex as SyncMutex;

use crate::adapter::{Access, AdapterFault, VariableKind, VariableTable, WireValue};
use crate::io_core::IoCore;

/// Fixed process-global application identity (spec.md §6: "a fixed
/// application URI and a fixed application name; both are process-global
/// constants").
pub const APPLICATION_URI: &str = "urn:io-opcua-core:server";
pub const APPLICATION_NAME: &str = "io-opcua-core";
pub const DEFAULT_ENDPOINT_URL: &str = "opc.tcp://0.0.0.0:4840/";

/// Builds a `Server` with one unencrypted, anonymous endpoint and every node
/// of `core.variables()` registered under an `IoVariables` folder.
///
/// The server is returned unstarted; the caller (the `io-opcua-server`
/// binary) is responsible for running it and wiring a shutdown hook, since
/// that loop belongs to the external protocol-stack collaborator, not to
/// this crate's contract.
pub fn build_server(core: Arc<IoCore>) -> Server {
    let server = ServerBuilder::new()
        .application_name(APPLICATION_NAME)
        .application_uri(APPLICATION_URI)
        .product_uri(APPLICATION_URI)
        .discovery_urls(vec![DEFAULT_ENDPOINT_URL.into()])
        .endpoint(
            "none",
            ServerEndpoint::new_none(DEFAULT_ENDPOINT_URL, &[ANONYMOUS_USER_TOKEN_ID.into()]),
        )
        .create_sample_keypair(false)
        .server()
        .expect("invalid OPC UA server configuration");

    register_variables(&server, core);
    server
}

fn register_variables(server: &Server, core: Arc<IoCore>) {
    let address_space = server.address_space();
    let mut address_space = address_space.write();

    let ns = address_space
        .register_namespace(APPLICATION_URI)
        .unwrap_or(2);

    let folder_id = address_space
        .add_folder("IoVariables", "IoVariables", &NodeId::objects_folder_id())
        .expect("failed to create IoVariables folder");

    for &(name, kind, access) in core.variables().entries() {
        let node_id = NodeId::new(ns, name);
        let writable = access.contains(Access::WRITE);

        let access_level = if writable {
            AccessLevel::CURRENT_READ | AccessLevel::CURRENT_WRITE
        } else {
            AccessLevel::CURRENT_READ
        };

        VariableBuilder::new(&node_id, name, name)
            .organized_by(&folder_id)
            .data_type(DataTypeId::UInt16)
            .value(0u16)
            .access_level(access_level)
            .user_access_level(access_level)
            .insert(&mut address_space);

        let Some(variable) = address_space.find_variable_mut(node_id.clone()) else {
            log::error!("opcua_binding: failed to register node {}", name);
            continue;
        };

        let reader = core.variables().clone();
        variable.set_value_getter(Arc::new(SyncMutex::new(AttrFnGetter::new(
            move |_, _, _, _, _, _| {
                Ok(Some(read_to_data_value(&reader, kind)))
            },
        ))));

        if writable {
            let writer = core.variables().clone();
            variable.set_value_setter(Arc::new(SyncMutex::new(AttrFnSetter::new(
                move |_, _, data_value: DataValue| {
                    Ok(write_from_data_value(&writer, kind, data_value))
                },
            ))));
        }
    }
}

/// Runs a read callback and converts its outcome into a wire `DataValue`,
/// attaching the source timestamp (converted to the protocol's wall-clock
/// epoch per spec.md §6) only when the adapter supplied one and translating
/// a `BadValue` outcome into the protocol's bad-value status rather than a
/// torn-down session (spec.md §4.4 failure semantics).
fn read_to_data_value(table: &VariableTable, kind: VariableKind) -> DataValue {
    match table.read(kind) {
        Ok(result) => {
            let mut data_value = DataValue::new_now(Variant::UInt16(result.value));
            data_value.source_timestamp = result.source_timestamp_ms.map(|ms| {
                let wire_epoch_seconds = crate::adapter::to_wire_epoch_seconds(ms);
                DateTime::from(std::time::UNIX_EPOCH + std::time::Duration::from_secs(wire_epoch_seconds))
            });
            data_value
        }
        Err(AdapterFault::BadValue) => {
            let mut data_value = DataValue::null();
            data_value.status = Some(StatusCode::BadWaitingForInitialData);
            data_value
        }
        Err(_) => {
            let mut data_value = DataValue::null();
            data_value.status = Some(StatusCode::BadInternalError);
            data_value
        }
    }
}

fn write_from_data_value(table: &VariableTable, kind: VariableKind, data_value: DataValue) -> StatusCode {
    let wire = match data_value.value {
        Some(Variant::UInt16(word)) => WireValue::U16(word),
        Some(Variant::Boolean(flag)) => WireValue::Boolean(flag),
        Some(Variant::Int32(word)) => WireValue::Int32(word),
        Some(Variant::Double(word)) => WireValue::Double(word),
        _ => return StatusCode::BadTypeMismatch,
    };

    match table.write(kind, wire) {
        Ok(()) => StatusCode::Good,
        Err(AdapterFault::TypeMismatch) => StatusCode::BadTypeMismatch,
        Err(AdapterFault::NotWritable) => StatusCode::BadNotWritable,
        Err(AdapterFault::BadValue) => StatusCode::BadOutOfRange,
    }
}
