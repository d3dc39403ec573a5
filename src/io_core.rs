//! `IoCore` — the single value that owns every piece of process-wide state
//! spec.md §9 says must not survive a rewrite as module-level singletons: the
//! cache, the bus handle, the diagnostics block and the clock are all fields
//! here, constructed once and handed out as `Arc` clones to the polling
//! scheduler and the variable adapter.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::adapter::VariableTable;
use crate::cache::IoCache;
use crate::clock::CoreClock;
use crate::config::CoreConfig;
use crate::dal::{self, DeviceBus, SharedBus};
use crate::diagnostics::Diagnostics;
use crate::scheduler::PollingScheduler;
use crate::{Error, Result};

/// The running core: cache, bus, diagnostics, polling scheduler and the
/// variable table bound to them. Lives as long as the process; dropping it
/// stops the polling scheduler (see `PollingScheduler`'s `Drop` impl).
///
/// Held behind an `Arc` by callers that also hand it (or its `variables()`
/// table) to protocol-layer closures, so `shutdown` takes `&self` rather
/// than `&mut self`: the scheduler handle is the one field that needs
/// interior mutability to stop from a shared reference.
pub struct IoCore {
    cache: Arc<IoCache>,
    bus: SharedBus,
    diagnostics: Arc<Diagnostics>,
    clock: CoreClock,
    variables: Arc<VariableTable>,
    scheduler: Mutex<PollingScheduler>,
    config: CoreConfig,
}

impl IoCore {
    /// Validates `config`, performs the one-shot `write_all_outputs_safe()`
    /// bring-up write, and starts the polling scheduler.
    ///
    /// Replaces the source system's lazy, first-call-triggered bus init
    /// (spec.md §4.1, §9) with the explicit `init_or_fatal()` step the
    /// redesign note calls for: a bus that cannot reach the de-energised
    /// safe state at startup is error kind 6 (fatal) and aborts
    /// construction rather than limping along sticky.
    pub fn start(bus: impl DeviceBus + 'static, config: CoreConfig) -> Result<IoCore> {
        config.validate()?;

        let clock = CoreClock::start();
        let cache = Arc::new(IoCache::new(
            clock.clone(),
            config.cache_read_timeout_ms,
            config.cache_write_timeout_ms,
        ));
        let bus: SharedBus = dal::shared(bus);

        if !bus.lock().write_all_outputs_safe() {
            return Err(Error::BusInit(
                "write_all_outputs_safe() could not reach the de-energised state".into(),
            ));
        }

        let diagnostics = Arc::new(Diagnostics::new());
        let scheduler = PollingScheduler::start(cache.clone(), bus.clone(), clock.clone(), config);
        let variables = Arc::new(VariableTable::new(cache.clone(), bus.clone(), diagnostics.clone(), clock.clone()));

        Ok(IoCore { cache, bus, diagnostics, clock, variables, scheduler: Mutex::new(scheduler), config })
    }

    /// The variable table a protocol binding registers its nodes against.
    pub fn variables(&self) -> &Arc<VariableTable> {
        &self.variables
    }

    pub fn cache(&self) -> &Arc<IoCache> {
        &self.cache
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub fn clock(&self) -> &CoreClock {
        &self.clock
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// True once the cache has tripped the clock-non-monotonicity fault
    /// (error kind 6). A caller driving its own shutdown sequence should
    /// treat this as equivalent to a failed `start()`.
    pub fn has_clock_fault(&self) -> bool {
        self.cache.clock_fault()
    }

    /// Cooperative shutdown: stops the polling scheduler and waits for it to
    /// exit at its next loop top. The protocol server itself is torn down by
    /// its own shutdown procedure, outside this core's contract.
    pub fn shutdown(&self) {
        self.scheduler.lock().stop();
    }
}
