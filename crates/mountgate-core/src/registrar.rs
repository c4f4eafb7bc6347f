//! Installing and removing the interception point.

use std::sync::Arc;

use mountgate_common::error::{MountGateError, Result};
use mountgate_common::types::SymbolAddr;

use crate::host::ProbeHost;
use crate::probe::Intercept;
use crate::symbol::SymbolResolver;

/// A probe attached to a resolved function address.
///
/// The probe is detached by [`InterceptionPoint::uninstall`], or when the
/// point is dropped.
#[must_use = "dropping an interception point detaches it immediately"]
pub struct InterceptionPoint {
    symbol: String,
    addr: SymbolAddr,
    probe: Arc<dyn Intercept>,
    host: Arc<dyn ProbeHost>,
    attached: bool,
}

impl std::fmt::Debug for InterceptionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionPoint")
            .field("symbol", &self.symbol)
            .field("addr", &format_args!("{}", self.addr))
            .finish_non_exhaustive()
    }
}

impl InterceptionPoint {
    /// Resolves `symbol` and attaches `probe` to it.
    ///
    /// # Errors
    ///
    /// Returns [`MountGateError::SymbolNotFound`] if `symbol` does not
    /// resolve, or [`MountGateError::RegistrationFailed`] with the host's
    /// status code if the probe cannot be attached.
    pub fn install(
        symbol: &str,
        resolver: &dyn SymbolResolver,
        host: Arc<dyn ProbeHost>,
        probe: Arc<dyn Intercept>,
    ) -> Result<Self> {
        let Some(addr) = resolver.lookup_name(symbol) else {
            tracing::error!(symbol, "could not find symbol, hooking failed");
            return Err(MountGateError::SymbolNotFound {
                symbol: symbol.to_owned(),
            });
        };

        if let Err(status) = host.register(addr, Arc::clone(&probe)) {
            tracing::error!(symbol, %addr, status, "return probe registration failed");
            return Err(MountGateError::RegistrationFailed {
                symbol: symbol.to_owned(),
                status,
            });
        }

        tracing::info!(symbol, %addr, "return probe registered");
        Ok(Self {
            symbol: symbol.to_owned(),
            addr,
            probe,
            host,
            attached: true,
        })
    }

    /// Detaches the probe and returns how many calls it missed for lack of
    /// a free slot.
    pub fn uninstall(mut self) -> u64 {
        self.detach();
        self.probe.nmissed()
    }

    fn detach(&mut self) {
        if !std::mem::replace(&mut self.attached, false) {
            return;
        }
        if self.host.unregister(self.addr).is_some() {
            tracing::info!(symbol = %self.symbol, addr = %self.addr, "return probe unregistered");
        } else {
            tracing::warn!(
                symbol = %self.symbol,
                addr = %self.addr,
                "return probe was already gone from the host"
            );
        }
        let missed = self.probe.nmissed();
        if missed > 0 {
            tracing::warn!(symbol = %self.symbol, missed, "probe missed invocations");
        }
    }

    /// Name the probe was resolved from.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Address the probe is attached to.
    pub const fn address(&self) -> SymbolAddr {
        self.addr
    }
}

impl Drop for InterceptionPoint {
    fn drop(&mut self) {
        self.detach();
    }
}
