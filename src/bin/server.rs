//! OPC UA server entry point.
//!
//! Wires CLI flags to a [`CoreConfig`], brings the I/O core up against a
//! [`DeviceBus`](io_opcua_core::dal::DeviceBus), builds the OPC UA address
//! space from its variable table, and runs until Ctrl-C.
//!
//! Real vendor I2C/ADC drivers are the out-of-scope hardware layer spec.md
//! §1 declares an external collaborator, so this binary runs the generic
//! core against the in-memory [`FakeBus`](io_opcua_core::dal::FakeBus);
//! shipping on real hardware means linking a concrete `InputExpander` /
//! `OutputExpander` / `AdcConverter` trio (from whatever vendor crate the
//! deployment uses) into an
//! [`I2cExpanderBus`](io_opcua_core::dal::I2cExpanderBus) here instead.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use opcua::server::prelude::Server;

use io_opcua_core::dal::FakeBus;
use io_opcua_core::opcua_binding;
use io_opcua_core::{CoreConfig, IoCore};

/// Real-time I/O cache and OPC UA variable adapter for an I2C-expander-based
/// industrial I/O controller.
#[derive(Parser, Debug)]
#[command(name = "io-opcua-server", about, version)]
struct Args {
    /// Discrete input poll cadence, in milliseconds (5..=1000).
    #[arg(long, default_value_t = CoreConfig::default().inputs_poll_ms)]
    inputs_poll_ms: u64,

    /// ADC batch poll cadence, in milliseconds (20..=10000).
    #[arg(long, default_value_t = CoreConfig::default().adc_poll_ms)]
    adc_poll_ms: u64,

    /// Bounded wait for a cache read acquisition, in milliseconds.
    #[arg(long, default_value_t = CoreConfig::default().cache_read_timeout_ms)]
    cache_read_timeout_ms: u64,

    /// Bounded wait for a cache write acquisition, in milliseconds.
    #[arg(long, default_value_t = CoreConfig::default().cache_write_timeout_ms)]
    cache_write_timeout_ms: u64,

    /// CPU core the polling thread is pinned to; opaque to the core, applied
    /// best-effort on platforms that expose affinity control.
    #[arg(long)]
    polling_core_id: Option<usize>,
}

impl From<Args> for CoreConfig {
    fn from(args: Args) -> CoreConfig {
        CoreConfig {
            inputs_poll_ms: args.inputs_poll_ms,
            adc_poll_ms: args.adc_poll_ms,
            cache_read_timeout_ms: args.cache_read_timeout_ms,
            cache_write_timeout_ms: args.cache_write_timeout_ms,
            polling_core_id: args.polling_core_id,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let config: CoreConfig = Args::parse().into();

    let (bus, _handle) = FakeBus::new();
    let core = match IoCore::start(bus, config) {
        Ok(core) => Arc::new(core),
        Err(error) => {
            log::error!("fatal: {}", error);
            return ExitCode::FAILURE;
        }
    };

    let server = opcua::sync::RwLock::new(opcua_binding::build_server(core.clone()));
    let server = Arc::new(server);

    {
        let server_for_signal = server.clone();
        let core_for_signal = core.clone();
        ctrlc::set_handler(move || {
            log::info!("shutdown requested");
            core_for_signal.shutdown();
            server_for_signal.write().abort();
        })
        .expect("failed to install Ctrl-C handler");
    }

    log::info!(
        "{} listening on {}",
        opcua_binding::APPLICATION_NAME,
        opcua_binding::DEFAULT_ENDPOINT_URL,
    );
    Server::run(server);
    core.shutdown();

    ExitCode::SUCCESS
}
