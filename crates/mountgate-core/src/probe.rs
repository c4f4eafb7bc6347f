//! Entry/return probe pairs.
//!
//! A [`ReturnProbe`] wraps one call frame of an intercepted function: it
//! takes a scratch slot from its pool, runs the handler's entry half, lets
//! the original body run, then runs the return half before the result goes
//! back to the caller. If no slot is free the frame runs unhooked and the
//! miss is counted.

use std::sync::Arc;

use crate::mount::Mount;
use crate::slot::{Slot, SlotPool};

/// Arguments of the hooked `attach_recursive_mnt(source, dest, ...)` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallArgs<'a> {
    /// Mount being attached.
    pub source: Option<&'a Arc<Mount>>,
    /// Mount it is attached under.
    pub dest: Option<&'a Arc<Mount>>,
}

impl<'a> CallArgs<'a> {
    /// Builds arguments from the two mounts.
    pub const fn new(source: Option<&'a Arc<Mount>>, dest: Option<&'a Arc<Mount>>) -> Self {
        Self { source, dest }
    }
}

/// Logic run on either side of the original function body.
pub trait ProbeHandler: Send + Sync {
    /// Per-frame scratch state passed from entry to return.
    type Data: Default + Send;

    /// Runs before the original body. Must not fail or block.
    fn entry(&self, data: &mut Self::Data, args: &CallArgs<'_>);

    /// Runs after the original body, before the caller sees the result.
    fn ret(&self, data: &mut Self::Data);
}

/// Type-erased probe as stored by a [`crate::host::ProbeHost`].
pub trait Intercept: Send + Sync {
    /// Runs `body` as one intercepted call frame and returns its result.
    fn around(&self, args: &CallArgs<'_>, body: &mut dyn FnMut() -> i32) -> i32;

    /// Frames that ran unhooked because the slot pool was exhausted.
    fn nmissed(&self) -> u64;
}

/// An entry/return handler pair with a bounded slot pool.
pub struct ReturnProbe<H: ProbeHandler> {
    handler: H,
    pool: SlotPool<H::Data>,
}

impl<H: ProbeHandler> ReturnProbe<H> {
    /// Creates a probe allowing `max_active` frames in flight at once.
    pub fn new(handler: H, max_active: usize) -> Self {
        Self {
            handler,
            pool: SlotPool::new(max_active),
        }
    }

    /// The handler this probe runs.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Runs `body` between the handler's entry and return halves.
    ///
    /// The return half also runs if `body` unwinds.
    pub fn fire<R>(&self, args: &CallArgs<'_>, body: impl FnOnce() -> R) -> R {
        let Some(mut slot) = self.pool.acquire() else {
            return body();
        };
        self.handler.entry(&mut slot, args);
        let frame = Frame {
            handler: &self.handler,
            slot,
        };
        let out = body();
        drop(frame);
        out
    }
}

impl<H: ProbeHandler + std::fmt::Debug> std::fmt::Debug for ReturnProbe<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReturnProbe")
            .field("handler", &self.handler)
            .field("max_active", &self.pool.capacity())
            .field("missed", &self.pool.missed())
            .finish()
    }
}

impl<H: ProbeHandler> Intercept for ReturnProbe<H> {
    fn around(&self, args: &CallArgs<'_>, body: &mut dyn FnMut() -> i32) -> i32 {
        self.fire(args, body)
    }

    fn nmissed(&self) -> u64 {
        self.pool.missed()
    }
}

/// Runs the return half when the frame ends, normally or by unwinding.
struct Frame<'a, H: ProbeHandler> {
    handler: &'a H,
    slot: Slot<'a, H::Data>,
}

impl<H: ProbeHandler> Drop for Frame<'_, H> {
    fn drop(&mut self) {
        self.handler.ret(&mut self.slot);
    }
}
