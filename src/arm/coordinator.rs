//! Motion and actuation coordinators.
//!
//! Both are built on the same scheduler idiom: fire the command, then hold
//! the chain until the hardware is known (motion: readiness poll) or
//! assumed (gripper: fixed dwell) to have settled.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::error::CellError;
use crate::scheduler::Scheduler;
use crate::traits::{GripperTransport, MotionTransport};
use crate::types::{GripCommand, PoseTarget};

/// Dwell substituted for the gripper's missing completion signal.
pub const DEFAULT_GRIP_DWELL: Duration = Duration::from_millis(2000);

/// Sequences motion and grip commands onto the scheduler. Cheap to clone;
/// clones share the transports and feed the same queue.
#[derive(Clone)]
pub struct ArmCoordinator {
    scheduler: Scheduler,
    motion: Arc<dyn MotionTransport>,
    gripper: Arc<dyn GripperTransport>,
    grip_dwell: Duration,
}

impl ArmCoordinator {
    pub fn new(
        scheduler: Scheduler,
        motion: Arc<dyn MotionTransport>,
        gripper: Arc<dyn GripperTransport>,
        grip_dwell: Duration,
    ) -> Self {
        Self {
            scheduler,
            motion,
            gripper,
            grip_dwell,
        }
    }

    /// Submit a motion command, then hold the chain until the arm reports
    /// ready again. No retry: if readiness never comes, the chain stalls at
    /// this step (or trips the scheduler's configured deadline).
    pub fn move_and_await_ready(
        &self,
        label: impl Into<String>,
        target: PoseTarget,
    ) -> Result<(), CellError> {
        let label = label.into();
        let motion = Arc::clone(&self.motion);
        let ready = Arc::clone(&self.motion);
        let log_label = label.clone();

        self.scheduler.run_then_wait_until(
            label,
            move || {
                debug!(action = %log_label, target = %target, "submitting move");
                if let Err(err) = motion.goto(target) {
                    error!(action = %log_label, %err, "move submission failed");
                }
            },
            move || ready.is_ready_to_move(),
        )?;
        Ok(())
    }

    /// Submit a grip command, then hold the chain for the fixed dwell. The
    /// command set is closed by type; raw strings are validated before they
    /// ever reach this call.
    pub fn actuate_and_dwell(&self, command: GripCommand) -> Result<(), CellError> {
        let gripper = Arc::clone(&self.gripper);
        self.scheduler.run(format!("grip {}", command), move || {
            debug!(command = %command, wire = command.wire_name(), "actuating gripper");
            if let Err(err) = gripper.actuate(command) {
                error!(command = %command, %err, "grip submission failed");
            }
        })?;
        self.scheduler.delay(self.grip_dwell)?;
        Ok(())
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn grip_dwell(&self) -> Duration {
        self.grip_dwell
    }
}
