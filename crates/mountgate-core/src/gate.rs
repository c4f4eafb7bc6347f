//! Hook lifecycle driven by the owning module.
//!
//! [`MountGate::init`] runs once at module startup and
//! [`MountGate::teardown`] once at shutdown. In between, the controller
//! flips the control surface through [`MountGate::set_paused`] or
//! [`MountGate::mark_bootstrap_started`]. Dropping the gate without a
//! teardown still detaches the probe; only the report is lost.
//!
//! [`MountGate::start`] is the startup path against the live system: it
//! loads the configuration, installs logging and resolves the target from
//! the kernel symbol table.

use std::path::Path;
use std::sync::Arc;

use mountgate_common::config::MountGateConfig;
use mountgate_common::error::Result;
use mountgate_common::logging;
use mountgate_common::types::SymbolAddr;
use serde::Serialize;

use crate::control::ControlState;
use crate::handler::{HookStats, PropagationSpoofer};
use crate::host::ProbeHost;
use crate::probe::{Intercept, ReturnProbe};
use crate::registrar::InterceptionPoint;
use crate::symbol::{KallsymsResolver, SymbolResolver};

/// Diagnostics reported when the hook is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Calls that ran unhooked because every slot was taken.
    pub missed: u64,
    /// Final activity counters.
    pub stats: HookStats,
}

/// The installed propagation hook and its control surface.
#[derive(Debug)]
pub struct MountGate {
    control: Arc<ControlState>,
    probe: Arc<ReturnProbe<PropagationSpoofer>>,
    point: Option<InterceptionPoint>,
}

impl MountGate {
    /// Installs the hook described by `config`.
    ///
    /// On a host without return-probe support the hook is created disabled:
    /// this succeeds, the control surface still works, and nothing is ever
    /// intercepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the target symbol
    /// cannot be resolved, or the host refuses the probe.
    pub fn init(
        config: &MountGateConfig,
        resolver: &dyn SymbolResolver,
        host: Arc<dyn ProbeHost>,
    ) -> Result<Self> {
        config.validate()?;
        let control = Arc::new(ControlState::from_config(config));
        let probe = Arc::new(ReturnProbe::new(
            PropagationSpoofer::new(Arc::clone(&control)),
            config.max_active,
        ));

        if !host.supports_return_probes() {
            tracing::info!(
                symbol = %config.symbol,
                "mount hook not enabled: host has no return probe support"
            );
            return Ok(Self {
                control,
                probe,
                point: None,
            });
        }

        let point = InterceptionPoint::install(
            &config.symbol,
            resolver,
            host,
            Arc::clone(&probe) as Arc<dyn Intercept>,
        )?;
        tracing::info!(
            symbol = %config.symbol,
            max_active = config.max_active,
            scope = %control.mode(),
            "mount propagation hook registered"
        );
        Ok(Self {
            control,
            probe,
            point: Some(point),
        })
    }

    /// Installs the hook, resolving the target against the symbol table at
    /// `config.kallsyms_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol table cannot be read, or for any
    /// reason [`MountGate::init`] fails.
    pub fn init_from_kallsyms(config: &MountGateConfig, host: Arc<dyn ProbeHost>) -> Result<Self> {
        let resolver = KallsymsResolver::load(&config.kallsyms_path)?;
        Self::init(config, &resolver, host)
    }

    /// Loads the configuration at `config_path`, installs the global log
    /// subscriber with its `log_filter`, then installs the hook through
    /// [`MountGate::init_from_kallsyms`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, or for any
    /// reason [`MountGate::init_from_kallsyms`] fails.
    pub fn start(config_path: &Path, host: Arc<dyn ProbeHost>) -> Result<Self> {
        let config = MountGateConfig::load(config_path)?;
        if !logging::init_from_config(&config) {
            tracing::debug!("log subscriber already installed, keeping it");
        }
        Self::init_from_kallsyms(&config, host)
    }

    /// Removes the hook and reports missed invocations.
    pub fn teardown(self) -> TeardownReport {
        let mut stats = self.stats();
        let missed = self.point.map_or(0, InterceptionPoint::uninstall);
        stats.missed = missed;
        TeardownReport { missed, stats }
    }

    /// Pauses or resumes shared propagation for subsequent calls.
    pub fn set_paused(&self, paused: bool) {
        self.control.set_paused(paused);
    }

    /// Latches the bootstrap signal. Returns `true` for the first call only.
    pub fn mark_bootstrap_started(&self) -> bool {
        self.control.mark_bootstrap_started()
    }

    /// Shared control surface.
    pub const fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    /// Whether a probe is attached.
    pub const fn is_installed(&self) -> bool {
        self.point.is_some()
    }

    /// Address the probe is attached to, if installed.
    pub fn address(&self) -> Option<SymbolAddr> {
        self.point.as_ref().map(InterceptionPoint::address)
    }

    /// Current activity counters.
    pub fn stats(&self) -> HookStats {
        let mut stats = self.probe.handler().stats();
        stats.missed = self.probe.nmissed();
        stats
    }
}
