//! The pick-and-place workflow: one admitted object's journey, expressed as
//! an ordered action chain. There is no separate state variable: the
//! current stage is whichever action sits at the queue head, and stage
//! `i + 1` starts only once stage `i`'s readiness wait or dwell resolves.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::arm::ArmCoordinator;
use crate::config::CellConfig;
use crate::error::CellError;
use crate::gate::ProcessingGate;
use crate::types::{BinId, GripCommand, ObjectSnapshot, Pose, PoseTarget};

/// Geometry and timing resolved once from config; immutable for the life of
/// every chain built from it.
#[derive(Debug, Clone)]
pub struct WorkflowParams {
    pub home: Pose,
    pub classify_height_mm: f64,
    pub pick_height_mm: f64,
    pub grip_orientation: [f64; 3],
    pub settle: Duration,
}

impl WorkflowParams {
    pub fn from_config(config: &CellConfig) -> Self {
        Self {
            home: config.arm.home,
            classify_height_mm: config.arm.classify_height_mm,
            pick_height_mm: config.arm.pick_height_mm,
            grip_orientation: config.arm.grip_orientation,
            settle: config.workflow.settle(),
        }
    }
}

/// Destination resolved from the classification result before the chain is
/// built; the coordinates are immutable for the life of the instance.
#[derive(Debug, Clone)]
pub struct BinTarget {
    pub id: BinId,
    pub label: String,
    pub x_mm: f64,
    pub y_mm: f64,
}

impl BinTarget {
    pub fn resolve(config: &CellConfig, id: BinId) -> Result<Self, CellError> {
        let slot = config.bin_slot(id).ok_or(CellError::UnknownBin(id))?;
        Ok(Self {
            id,
            label: slot.label.clone(),
            x_mm: slot.x_mm,
            y_mm: slot.y_mm,
        })
    }
}

fn progress(id: Uuid, msg: &'static str) -> impl FnOnce() + Send + 'static {
    move || info!(workflow = %id, "{}", msg)
}

/// Enqueue the full chain for one object:
/// move to object → set grip orientation → open → descend → close → ascend
/// → move to bin → open → close → move home → settle → release gate.
///
/// Every step's input is captured by value here, at enqueue time; the
/// instance carries no further mutable state. Returns the workflow id used
/// to correlate its log lines.
pub fn enqueue_pick_and_place(
    arm: &ArmCoordinator,
    gate: Arc<ProcessingGate>,
    snapshot: ObjectSnapshot,
    bin: BinTarget,
    params: &WorkflowParams,
) -> Result<Uuid, CellError> {
    let id = Uuid::new_v4();
    let scheduler = arm.scheduler().clone();
    let [a, b, c] = params.grip_orientation;

    info!(
        workflow = %id,
        bin = %bin.id,
        label = %bin.label,
        x_mm = snapshot.x_mm,
        y_mm = snapshot.y_mm,
        "pick-and-place admitted"
    );

    scheduler.run("announce pick", move || {
        info!(
            workflow = %id,
            x_mm = snapshot.x_mm,
            y_mm = snapshot.y_mm,
            "moving to object"
        );
    })?;
    arm.move_and_await_ready(
        "move to object",
        PoseTarget::position(snapshot.x_mm, snapshot.y_mm, params.classify_height_mm),
    )?;
    arm.move_and_await_ready("set grip orientation", PoseTarget::orientation(a, b, c))?;

    scheduler.run("announce open", progress(id, "opening claw"))?;
    arm.actuate_and_dwell(GripCommand::Open)?;

    scheduler.run("announce descend", progress(id, "descending to object"))?;
    arm.move_and_await_ready("descend", PoseTarget::height(params.pick_height_mm))?;

    scheduler.run("announce close", progress(id, "closing claw"))?;
    arm.actuate_and_dwell(GripCommand::Close)?;

    scheduler.run("announce ascend", progress(id, "object picked, ascending"))?;
    arm.move_and_await_ready("ascend", PoseTarget::height(params.classify_height_mm))?;

    {
        let bin_label = bin.label.clone();
        let (bin_x, bin_y) = (bin.x_mm, bin.y_mm);
        scheduler.run("announce transport", move || {
            info!(
                workflow = %id,
                label = %bin_label,
                x_mm = bin_x,
                y_mm = bin_y,
                "transporting to bin"
            );
        })?;
    }
    arm.move_and_await_ready("move to bin", PoseTarget::translation(bin.x_mm, bin.y_mm))?;

    scheduler.run("announce release", progress(id, "releasing object"))?;
    arm.actuate_and_dwell(GripCommand::Open)?;
    arm.actuate_and_dwell(GripCommand::Close)?;

    scheduler.run("announce home", progress(id, "returning home"))?;
    arm.move_and_await_ready("move home", PoseTarget::pose(params.home))?;

    // Let the scene settle before the next detection is accepted.
    scheduler.delay(params.settle)?;
    scheduler.run("release gate", move || {
        gate.exit();
        info!(workflow = %id, "workflow complete, ready for next object");
    })?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::arm::ArmCoordinator;
    use crate::scheduler::{Scheduler, SchedulerConfig};
    use crate::sim::{SimArm, SimGripper};
    use crate::traits::{GripperTransport, MotionTransport};

    fn cell_parts() -> (ArmCoordinator, Arc<SimArm>, Arc<SimGripper>, Arc<ProcessingGate>) {
        let (scheduler, worker) = Scheduler::new(SchedulerConfig::default());
        worker.spawn();
        let arm = Arc::new(SimArm::new());
        let gripper = Arc::new(SimGripper::new());
        let coordinator = ArmCoordinator::new(
            scheduler,
            Arc::clone(&arm) as Arc<dyn MotionTransport>,
            Arc::clone(&gripper) as Arc<dyn GripperTransport>,
            Duration::from_millis(2000),
        );
        (coordinator, arm, gripper, Arc::new(ProcessingGate::new()))
    }

    fn snapshot() -> ObjectSnapshot {
        ObjectSnapshot {
            x_mm: 430.0,
            y_mm: 655.0,
            width_mm: 40.0,
            height_mm: 60.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_drives_grip_sequence_and_parks_home() {
        let (coordinator, arm, gripper, gate) = cell_parts();
        let config = CellConfig::default_cell();
        let params = WorkflowParams::from_config(&config);
        let bin = BinTarget::resolve(&config, BinId::new(2)).unwrap();

        assert!(gate.is_busy());
        enqueue_pick_and_place(&coordinator, Arc::clone(&gate), snapshot(), bin, &params)
            .unwrap();

        let done = coordinator.scheduler().barrier().unwrap();
        done.await.unwrap();

        assert_eq!(
            gripper.commands(),
            vec![
                GripCommand::Open,
                GripCommand::Close,
                GripCommand::Open,
                GripCommand::Close,
            ]
        );
        assert_eq!(arm.pose(), params.home);
        assert!(!gate.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_reopens_only_after_settle() {
        let (coordinator, _arm, _gripper, gate) = cell_parts();
        let config = CellConfig::default_cell();
        let params = WorkflowParams::from_config(&config);
        let bin = BinTarget::resolve(&config, BinId::new(0)).unwrap();

        let started = Instant::now();
        enqueue_pick_and_place(&coordinator, Arc::clone(&gate), snapshot(), bin, &params)
            .unwrap();

        let done = coordinator.scheduler().barrier().unwrap();
        done.await.unwrap();

        assert!(!gate.is_busy());
        // four dwells plus the settle delay bound the chain from below
        let floor = Duration::from_millis(4 * 2000) + params.settle;
        assert!(started.elapsed() >= floor);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_bin_is_rejected_before_enqueue() {
        let config = CellConfig::default_cell();
        let err = BinTarget::resolve(&config, BinId::new(42)).unwrap_err();
        assert!(matches!(err, CellError::UnknownBin(bin) if bin == BinId::new(42)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_descend_goes_to_pick_height_before_bin_move() {
        let (coordinator, arm, _gripper, gate) = cell_parts();
        let config = CellConfig::default_cell();
        let params = WorkflowParams::from_config(&config);
        let bin = BinTarget::resolve(&config, BinId::new(1)).unwrap();

        enqueue_pick_and_place(&coordinator, gate, snapshot(), bin.clone(), &params).unwrap();
        let done = coordinator.scheduler().barrier().unwrap();
        done.await.unwrap();

        let moves = arm.moves();
        let descend = moves
            .iter()
            .position(|m| *m == PoseTarget::height(params.pick_height_mm))
            .expect("descend move present");
        let to_bin = moves
            .iter()
            .position(|m| *m == PoseTarget::translation(bin.x_mm, bin.y_mm))
            .expect("bin move present");
        assert!(descend < to_bin);
    }
}
