//! Mount-table entries as seen by the hook.
//!
//! The host owns every [`Mount`]. The hook only borrows one for the length
//! of a hooked call and keeps at most a [`std::sync::Weak`] to it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use mountgate_common::constants::MNT_SHARED;
use mountgate_common::types::{MountFlags, MountId};

/// One mounted filesystem instance.
#[derive(Debug)]
pub struct Mount {
    id: MountId,
    device_name: String,
    flags: AtomicU32,
}

/// Shared handle to a host-owned mount.
pub type MountRef = Arc<Mount>;

impl Mount {
    /// Creates a mount entry.
    pub fn new(id: MountId, device_name: impl Into<String>, flags: MountFlags) -> Self {
        Self {
            id,
            device_name: device_name.into(),
            flags: AtomicU32::new(flags.bits()),
        }
    }

    /// Convenience constructor returning a shared handle.
    pub fn shared_ref(id: u64, device_name: impl Into<String>, flags: MountFlags) -> MountRef {
        Arc::new(Self::new(MountId::new(id), device_name, flags))
    }

    /// Mount identifier.
    pub const fn id(&self) -> MountId {
        self.id
    }

    /// Name of the device this mount was made from.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Current flags.
    pub fn flags(&self) -> MountFlags {
        MountFlags::from_bits(self.flags.load(Ordering::Acquire))
    }

    /// Overwrites the flags word.
    pub fn set_flags(&self, flags: MountFlags) {
        self.flags.store(flags.bits(), Ordering::Release);
    }

    /// Whether the shared-propagation bit is currently set.
    pub fn is_shared(&self) -> bool {
        self.flags().is_shared()
    }

    /// Clears the shared-propagation bit and returns the flags as they were
    /// immediately before.
    pub fn clear_shared(&self) -> MountFlags {
        MountFlags::from_bits(self.flags.fetch_and(!MNT_SHARED, Ordering::AcqRel))
    }
}
