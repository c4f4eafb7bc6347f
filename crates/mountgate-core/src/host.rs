//! Hosts that attach probes to function addresses.
//!
//! In a kernel this is the return-probe facility. [`InProcessHost`] is the
//! user-space equivalent: callers route calls to a hooked function through
//! [`InProcessHost::call`], which wraps the body in whatever probe is
//! attached at that address.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use mountgate_common::types::SymbolAddr;

use crate::mount::Mount;
use crate::probe::{CallArgs, Intercept};

/// A facility that can attach an entry/return pair to a function address.
pub trait ProbeHost: Send + Sync {
    /// Whether return probes exist at all on this host.
    fn supports_return_probes(&self) -> bool {
        true
    }

    /// Attaches `probe` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns the host's negative status code if the probe cannot be
    /// attached.
    fn register(&self, addr: SymbolAddr, probe: Arc<dyn Intercept>) -> Result<(), i32>;

    /// Detaches whatever probe is attached at `addr` and hands it back.
    fn unregister(&self, addr: SymbolAddr) -> Option<Arc<dyn Intercept>>;
}

/// Probe table for functions called within this process.
pub struct InProcessHost {
    probes: RwLock<HashMap<SymbolAddr, Arc<dyn Intercept>>>,
    return_probes: bool,
}

impl std::fmt::Debug for InProcessHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessHost")
            .field("attached", &self.attached())
            .field("return_probes", &self.return_probes)
            .finish()
    }
}

impl Default for InProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessHost {
    /// Creates a host with return-probe support and nothing attached.
    pub fn new() -> Self {
        Self {
            probes: RwLock::new(HashMap::new()),
            return_probes: true,
        }
    }

    /// Creates a host that, like a kernel built without kprobes, cannot
    /// attach return probes.
    pub fn without_return_probes() -> Self {
        Self {
            return_probes: false,
            ..Self::new()
        }
    }

    /// Number of attached probes.
    pub fn attached(&self) -> usize {
        self.probes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether a probe is attached at `addr`.
    pub fn is_attached(&self, addr: SymbolAddr) -> bool {
        self.probes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&addr)
    }

    /// Calls the function at `addr` with `source` and `dest`, running
    /// `body` as its original implementation.
    ///
    /// With a probe attached the body runs inside its entry/return pair;
    /// otherwise it runs directly.
    pub fn call(
        &self,
        addr: SymbolAddr,
        source: Option<&Arc<Mount>>,
        dest: Option<&Arc<Mount>>,
        mut body: impl FnMut() -> i32,
    ) -> i32 {
        let probe = self
            .probes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&addr)
            .cloned();
        match probe {
            Some(probe) => probe.around(&CallArgs::new(source, dest), &mut body),
            None => body(),
        }
    }
}

impl ProbeHost for InProcessHost {
    fn supports_return_probes(&self) -> bool {
        self.return_probes
    }

    fn register(&self, addr: SymbolAddr, probe: Arc<dyn Intercept>) -> Result<(), i32> {
        if !self.return_probes {
            return Err(-libc::ENOSYS);
        }
        if addr.is_null() {
            return Err(-libc::EINVAL);
        }
        let mut probes = self.probes.write().unwrap_or_else(PoisonError::into_inner);
        match probes.entry(addr) {
            Entry::Occupied(_) => Err(-libc::EBUSY),
            Entry::Vacant(slot) => {
                let _ = slot.insert(probe);
                Ok(())
            }
        }
    }

    fn unregister(&self, addr: SymbolAddr) -> Option<Arc<dyn Intercept>> {
        self.probes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&addr)
    }
}
