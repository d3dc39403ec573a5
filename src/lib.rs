//! Real-time I/O cache and OPC UA variable adapter for a 16-input / 16-output /
//! 4-channel-ADC industrial I/O controller built on I2C-expander hardware.
//!
//! The crate is organised leaf-first: [`dal`] is the only module that ever
//! touches a physical bus, [`cache`] is the sole serialisation point between
//! the polling side and the network side, [`scheduler`] refreshes the cache
//! at fixed cadences, and [`adapter`] binds cache and bus to a protocol
//! node table. [`diagnostics`] sits beside the adapter and is exercised by
//! conformance tests, not by hardware.

mod clock;
mod config;
pub mod dal;
pub mod cache;
pub mod scheduler;
pub mod adapter;
pub mod diagnostics;
mod io_core;

#[cfg(feature = "server")]
pub mod opcua_binding;

pub use clock::CoreClock;
pub use config::{CoreConfig, ConfigError};
pub use io_core::IoCore;

#[derive(Debug)]
pub enum Error {
    BusInit(String),
    ClockNonMonotonic,
    Config(ConfigError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::BusInit(reason) =>
                write!(f, "device bus initialisation failed: {}", reason),
            Self::ClockNonMonotonic =>
                write!(f, "monotonic clock went backwards"),
            Self::Config(inner) =>
                write!(f, "{}", inner),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Error::Config(error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of variable node identifiers exposed on the wire.
pub mod node_id {
    pub const DISCRETE_INPUTS: &str = "discrete_inputs";
    pub const DISCRETE_OUTPUTS: &str = "discrete_outputs";
    pub const ADC_CHANNEL: [&str; 4] =
        ["adc_channel_1", "adc_channel_2", "adc_channel_3", "adc_channel_4"];
    pub const DIAGNOSTIC_COUNTER: &str = "diagnostic_counter";
    pub const LOOPBACK_INPUT: &str = "loopback_input";
    pub const LOOPBACK_OUTPUT: &str = "loopback_output";
}
