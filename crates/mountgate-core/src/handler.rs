//! Spoof-and-restore logic for `attach_recursive_mnt`.
//!
//! At entry, an in-scope call whose destination is shared has the
//! destination's shared bit cleared so the new mount is attached as
//! private. At return, the flags captured at entry are written back as-is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use mountgate_common::types::MountFlags;
use serde::Serialize;

use crate::control::ControlState;
use crate::mount::Mount;
use crate::probe::{CallArgs, ProbeHandler};

/// Scratch state carried from entry to return for one call frame.
#[derive(Debug, Default)]
pub struct SpoofState {
    dest: Weak<Mount>,
    original_flags: MountFlags,
    spoofed: bool,
}

impl SpoofState {
    /// Whether entry cleared the destination's shared bit.
    pub const fn spoofed(&self) -> bool {
        self.spoofed
    }

    /// Flags captured at entry.
    pub const fn original_flags(&self) -> MountFlags {
        self.original_flags
    }
}

/// Snapshot of hook activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HookStats {
    /// Frames that reached the entry handler.
    pub hits: u64,
    /// Frames that cleared a shared bit.
    pub spoofed: u64,
    /// Frames that put original flags back.
    pub restored: u64,
    /// Frames that bypassed the hook for lack of a free slot.
    pub missed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    spoofed: AtomicU64,
    restored: AtomicU64,
}

/// Entry/return handler that suspends shared propagation on the
/// destination mount.
#[derive(Debug)]
pub struct PropagationSpoofer {
    control: Arc<ControlState>,
    counters: Counters,
}

impl PropagationSpoofer {
    /// Creates a handler reading `control` at every entry.
    pub fn new(control: Arc<ControlState>) -> Self {
        Self {
            control,
            counters: Counters::default(),
        }
    }

    /// Control state consulted at entry.
    pub const fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    /// Current counters. `missed` is filled in by the owning probe.
    pub fn stats(&self) -> HookStats {
        HookStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            spoofed: self.counters.spoofed.load(Ordering::Relaxed),
            restored: self.counters.restored.load(Ordering::Relaxed),
            missed: 0,
        }
    }
}

impl ProbeHandler for PropagationSpoofer {
    type Data = SpoofState;

    fn entry(&self, state: &mut SpoofState, args: &CallArgs<'_>) {
        state.spoofed = false;
        let _ = self.counters.hits.fetch_add(1, Ordering::Relaxed);

        if !self.control.in_scope(args.source.map(Arc::as_ref)) {
            return;
        }
        let (Some(_), Some(dest)) = (args.source, args.dest) else {
            return;
        };
        if !dest.is_shared() {
            return;
        }

        let original = dest.clear_shared();
        // Another frame cleared the bit first and owns its restoration.
        if !original.is_shared() {
            return;
        }
        tracing::debug!(
            mount = %dest.id(),
            flags = %original,
            spoofed_flags = %original.without_shared(),
            "paused mount propagation: spoofing shared mount as private"
        );
        state.dest = Arc::downgrade(dest);
        state.original_flags = original;
        state.spoofed = true;
        let _ = self.counters.spoofed.fetch_add(1, Ordering::Relaxed);
    }

    fn ret(&self, state: &mut SpoofState) {
        if !state.spoofed {
            return;
        }
        state.spoofed = false;
        // The owner may have released the mount while the call ran.
        let Some(dest) = state.dest.upgrade() else {
            return;
        };
        tracing::debug!(
            mount = %dest.id(),
            flags = %state.original_flags,
            "restoring original shared flags"
        );
        dest.set_flags(state.original_flags);
        let _ = self.counters.restored.fetch_add(1, Ordering::Relaxed);
    }
}
