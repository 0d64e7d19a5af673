//! The cell controller: the single admission path from "object in view" to
//! an enqueued workflow. Owns the processing gate, the centering retry
//! loop, and the startup sequence that parks the arm before the gate first
//! opens.

use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::arm::ArmCoordinator;
use crate::config::CellConfig;
use crate::error::CellError;
use crate::gate::ProcessingGate;
use crate::scheduler::Scheduler;
use crate::traits::{Classifier, DetectionSource};
use crate::types::{Detection, GripCommand, ObjectSnapshot, PoseTarget};
use crate::workflow::{BinTarget, WorkflowParams, enqueue_pick_and_place};

pub struct CellController<D, C> {
    config: CellConfig,
    params: WorkflowParams,
    scheduler: Scheduler,
    arm: ArmCoordinator,
    gate: Arc<ProcessingGate>,
    detector: D,
    classifier: C,
}

impl<D, C> CellController<D, C>
where
    D: DetectionSource,
    C: Classifier,
{
    pub fn new(
        config: CellConfig,
        scheduler: Scheduler,
        arm: ArmCoordinator,
        detector: D,
        classifier: C,
    ) -> Self {
        let params = WorkflowParams::from_config(&config);
        Self {
            config,
            params,
            scheduler,
            arm,
            gate: Arc::new(ProcessingGate::new()),
            detector,
            classifier,
        }
    }

    pub fn gate(&self) -> &Arc<ProcessingGate> {
        &self.gate
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Park the arm and close the gripper, then open the gate. The gate
    /// starts busy, so no detection is admitted before this chain runs.
    pub fn startup(&self) -> Result<(), CellError> {
        info!("startup: parking arm before accepting detections");
        self.arm
            .move_and_await_ready("startup home", PoseTarget::pose(self.params.home))?;
        self.arm.actuate_and_dwell(GripCommand::Close)?;

        let gate = Arc::clone(&self.gate);
        self.scheduler.run("open gate", move || {
            gate.exit();
            info!("cell ready to detect");
        })?;
        Ok(())
    }

    /// Process one camera frame: poll the detector and, if an object is in
    /// view and no workflow is in flight, admit it. Returns the admitted
    /// workflow's id, or `None` when there was nothing to do.
    pub async fn process_frame(&mut self) -> Result<Option<Uuid>, CellError> {
        let Some(detection) = self.detector.poll_detection() else {
            return Ok(None);
        };

        if !self.gate.try_enter() {
            trace!("object in view but a workflow is in flight, frame dropped");
            return Ok(None);
        }

        match self.admit(detection).await {
            Ok(id) => Ok(Some(id)),
            Err(err) => {
                warn!(%err, "admission aborted");
                self.abort_admission();
                Err(err)
            }
        }
    }

    async fn admit(&mut self, first: Detection) -> Result<Uuid, CellError> {
        let snapshot = self.center_object(first).await?;
        let bin = self.classifier.classify()?;
        let target = BinTarget::resolve(&self.config, bin)?;
        debug!(bin = %bin, label = %target.label, "object classified");

        enqueue_pick_and_place(
            &self.arm,
            Arc::clone(&self.gate),
            snapshot,
            target,
            &self.params,
        )
    }

    /// Bounded centering loop: hover the arm over the latest reading until
    /// the detector reports the object centred, then freeze the snapshot.
    /// Each iteration's coordinates are immutable locals moved into the
    /// enqueued closure.
    async fn center_object(&mut self, first: Detection) -> Result<ObjectSnapshot, CellError> {
        let max_attempts = self.config.centering.max_attempts;
        let mut reading = first;
        let mut attempts = 0;

        loop {
            if reading.centered {
                debug!(attempts, "object centred");
                return Ok(ObjectSnapshot::from_detection(&reading));
            }
            if attempts >= max_attempts {
                return Err(CellError::CenteringFailed {
                    attempts: max_attempts,
                });
            }
            attempts += 1;

            let (x, y) = (reading.x_mm, reading.y_mm);
            debug!(attempts, x_mm = x, y_mm = y, "object off-centre, adjusting");
            self.arm.move_and_await_ready(
                "centre over object",
                PoseTarget::position(x, y, self.params.classify_height_mm),
            )?;

            let settled = self.scheduler.barrier()?;
            settled.await.map_err(|_| CellError::SchedulerClosed)?;

            reading = self.detector.poll_detection().ok_or(CellError::ObjectLost)?;
        }
    }

    /// Best-effort recovery when admission fails mid-flight: park the arm,
    /// then reopen the gate from the chain so nothing is readmitted before
    /// the arm is clear.
    fn abort_admission(&self) {
        let gate = Arc::clone(&self.gate);
        let scheduled = self
            .arm
            .move_and_await_ready("abort re-home", PoseTarget::pose(self.params.home))
            .and_then(|_| {
                self.scheduler
                    .run("reopen gate", move || gate.exit())
                    .map_err(CellError::from)
            });
        if let Err(err) = scheduled {
            error!(%err, "abort path could not be scheduled, reopening gate directly");
            self.gate.exit();
        }
    }
}
