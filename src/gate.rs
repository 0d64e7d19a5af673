//! The processing gate: one exclusive flag admitting at most one detected
//! object into the pick-and-place pipeline at a time.
//!
//! The gate is owned state with exactly two operations; callers never touch
//! the flag directly. It is an atomic so a capture thread running parallel
//! to the scheduler cannot double-admit: the observe-free-and-flip in
//! [`ProcessingGate::try_enter`] is indivisible.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Coarse mutex over the whole workflow pipeline, not a per-object lock.
/// Exactly one caller path enters (the detection handler) and one exits
/// (the workflow's terminal action, after the settle delay).
#[derive(Debug)]
pub struct ProcessingGate {
    busy: AtomicBool,
}

impl ProcessingGate {
    /// A new gate starts busy: nothing is admitted until the startup
    /// sequence has parked the arm and explicitly opened it.
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(true),
        }
    }

    /// Atomically observe "free" and flip to "busy". Returns false, with no
    /// state change, if a workflow is already in flight.
    pub fn try_enter(&self) -> bool {
        let admitted = self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if admitted {
            debug!("processing gate closed, workflow admitted");
        }
        admitted
    }

    /// Reopen the gate unconditionally.
    pub fn exit(&self) {
        self.busy.store(false, Ordering::SeqCst);
        debug!("processing gate open");
    }

    /// Whether a workflow is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

impl Default for ProcessingGate {
    fn default() -> Self {
        Self::new()
    }
}
