//! Configuration knobs recognised by the core.
//!
//! No environment variables are consulted here; configuration is injected at
//! construction, by the CLI binary or by a test harness.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreConfig {
    pub inputs_poll_ms: u64,
    pub adc_poll_ms: u64,
    pub cache_read_timeout_ms: u64,
    pub cache_write_timeout_ms: u64,
    pub polling_core_id: Option<usize>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            inputs_poll_ms: 20,
            adc_poll_ms: 100,
            cache_read_timeout_ms: 5,
            cache_write_timeout_ms: 20,
            polling_core_id: None,
        }
    }
}

const INPUTS_POLL_MS_RANGE: (u64, u64) = (5, 1000);
const ADC_POLL_MS_RANGE: (u64, u64) = (20, 10000);

impl CoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = INPUTS_POLL_MS_RANGE;
        if !(min..=max).contains(&self.inputs_poll_ms) {
            return Err(ConfigError::OutOfRange { field: "inputs_poll_ms", min, max, value: self.inputs_poll_ms });
        }
        let (min, max) = ADC_POLL_MS_RANGE;
        if !(min..=max).contains(&self.adc_poll_ms) {
            return Err(ConfigError::OutOfRange { field: "adc_poll_ms", min, max, value: self.adc_poll_ms });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    OutOfRange { field: &'static str, min: u64, max: u64, value: u64 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::OutOfRange { field, min, max, value } =>
                write!(f, "{} = {} is out of range [{}, {}]", field, value, min, max),
        }
    }
}

impl std::error::Error for ConfigError {}
