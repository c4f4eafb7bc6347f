//! Control surface shared between the controller and the hook.
//!
//! The controller writes through [`ControlState::set_paused`] or
//! [`ControlState::mark_bootstrap_started`]; the entry handler only reads,
//! apart from the one-time capture of the trusted source device.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use mountgate_common::config::MountGateConfig;
use mountgate_common::types::ScopeMode;

use crate::mount::Mount;

/// Process-wide switches consulted at every hooked entry.
#[derive(Debug)]
pub struct ControlState {
    mode: ScopeMode,
    paused: AtomicBool,
    bootstrap_started: AtomicBool,
    trusted_device: OnceLock<String>,
    trusted_prefixes: Vec<String>,
}

impl ControlState {
    /// Creates a control state in `mode`, not paused, bootstrap not started.
    pub fn new(mode: ScopeMode, trusted_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            paused: AtomicBool::new(false),
            bootstrap_started: AtomicBool::new(false),
            trusted_device: OnceLock::new(),
            trusted_prefixes,
        }
    }

    /// Builds the control state described by `config`.
    pub fn from_config(config: &MountGateConfig) -> Self {
        Self::new(config.scope, config.trusted_device_prefixes.clone())
    }

    /// Scope mode this state was built with.
    pub const fn mode(&self) -> ScopeMode {
        self.mode
    }

    /// Pauses (`true`) or resumes (`false`) shared propagation for
    /// subsequent hooked calls. Calls already inside the hook keep the
    /// decision they made at entry.
    pub fn set_paused(&self, paused: bool) {
        let was = self.paused.swap(paused, Ordering::AcqRel);
        if paused {
            tracing::info!(was_paused = was, "pausing mount propagation");
        } else {
            tracing::info!(was_paused = was, "resuming mount propagation");
        }
        if self.mode != ScopeMode::Toggle {
            tracing::debug!(mode = %self.mode, "pause flag recorded but not used for scope");
        }
    }

    /// Whether propagation is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Latches the bootstrap signal. Returns `true` only for the call that
    /// flipped the latch.
    pub fn mark_bootstrap_started(&self) -> bool {
        let latched = self
            .bootstrap_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if latched {
            tracing::info!(
                trusted_device = self.trusted_device().unwrap_or("<none>"),
                "bootstrap process started, narrowing hook scope"
            );
        }
        latched
    }

    /// Whether the bootstrap signal has been received.
    pub fn bootstrap_started(&self) -> bool {
        self.bootstrap_started.load(Ordering::Acquire)
    }

    /// Source device captured as trusted, if any.
    pub fn trusted_device(&self) -> Option<&str> {
        self.trusted_device.get().map(String::as_str)
    }

    /// Decides whether a hooked call with this source mount is in scope.
    ///
    /// In bootstrap mode this is also where the trusted device gets
    /// captured: the first source whose device name matches a trusted
    /// prefix wins and is never replaced.
    pub fn in_scope(&self, source: Option<&Mount>) -> bool {
        match self.mode {
            ScopeMode::Toggle => self.is_paused(),
            ScopeMode::Bootstrap => {
                if let Some(src) = source {
                    self.observe_source(src);
                }
                if !self.bootstrap_started() {
                    return true;
                }
                match (source, self.trusted_device()) {
                    (Some(src), Some(trusted)) => src.device_name() == trusted,
                    _ => false,
                }
            }
        }
    }

    fn observe_source(&self, source: &Mount) {
        if self.trusted_device.get().is_some() {
            return;
        }
        let name = source.device_name();
        if !self
            .trusted_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
        {
            return;
        }
        if self.trusted_device.set(name.to_owned()).is_ok() {
            tracing::info!(device = name, mount = %source.id(), "captured trusted source device");
        }
    }
}
