//! # mountgate-core
//!
//! A return-probe hook on the VFS function that attaches a new mount under
//! its destination. While active, the hook clears the destination's
//! shared-propagation bit for the duration of the call and puts the exact
//! original flags back when the call returns, so mounts created in that
//! window come out private instead of joining the destination's peer group.
//!
//! The pieces, leaf first:
//! - **[`mount`]**: the borrowed mount-table entry and its flags word.
//! - **[`slot`]**: the bounded pool of per-invocation scratch slots.
//! - **[`control`]**: the pause toggle and the bootstrap/trusted-device gate.
//! - **[`probe`]**: the entry/return pair wrapped around one call frame.
//! - **[`handler`]**: the spoof-and-restore logic run by that pair.
//! - **[`symbol`]** and **[`host`]**: resolving the target by name and
//!   attaching probes to it.
//! - **[`registrar`]**: installing and removing the interception point.
//! - **[`gate`]**: the lifecycle the owning module drives.
//!
//! The window between clearing and restoring the bit is not locked against
//! other readers of the same mount. Another path that inspects the
//! destination's flags mid-call can see it as private.

pub mod control;
pub mod gate;
pub mod handler;
pub mod host;
pub mod mount;
pub mod probe;
pub mod registrar;
pub mod slot;
pub mod symbol;

pub use gate::{MountGate, TeardownReport};
