//! Simulated collaborators: an arm whose readiness flag flips after a fixed
//! motion latency, a gripper that records what it was told, a scripted
//! detection source, and a canned classifier. These back the test suite and
//! the `simulate` CLI command, standing in for the hardware transports and
//! vision models the crate deliberately does not implement.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::CellError;
use crate::traits::{Classifier, DetectionSource, GripperTransport, MotionTransport};
use crate::types::{BinId, Detection, GripCommand, Pose, PoseTarget};

/// Simulated arm. Accepts any motion command instantly, then reports
/// not-ready for a fixed latency; the readiness poll is what the motion
/// coordinator synchronizes on, exactly as with the real arm.
pub struct SimArm {
    state: Mutex<ArmState>,
    move_latency: Duration,
}

struct ArmState {
    pose: Pose,
    moves: Vec<PoseTarget>,
    busy_until: Option<Instant>,
}

impl SimArm {
    pub fn new() -> Self {
        Self::with_latency(Duration::from_millis(250))
    }

    pub fn with_latency(move_latency: Duration) -> Self {
        Self {
            state: Mutex::new(ArmState {
                pose: Pose::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
                moves: Vec::new(),
                busy_until: None,
            }),
            move_latency,
        }
    }

    /// Pose after all accepted moves.
    pub fn pose(&self) -> Pose {
        self.state.lock().unwrap().pose
    }

    /// Every accepted motion command, in order.
    pub fn moves(&self) -> Vec<PoseTarget> {
        self.state.lock().unwrap().moves.clone()
    }
}

impl Default for SimArm {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionTransport for SimArm {
    fn goto(&self, target: PoseTarget) -> Result<(), CellError> {
        let mut state = self.state.lock().unwrap();
        state.pose = state.pose.apply(target);
        state.moves.push(target);
        state.busy_until = Some(Instant::now() + self.move_latency);
        debug!(target = %target, pose = %state.pose, "sim arm moving");
        Ok(())
    }

    fn is_ready_to_move(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .busy_until
            .is_none_or(|until| Instant::now() >= until)
    }
}

/// Simulated gripper. Records every accepted command; like the hardware, it
/// never acknowledges completion.
pub struct SimGripper {
    commands: Mutex<Vec<GripCommand>>,
}

impl SimGripper {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<GripCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl Default for SimGripper {
    fn default() -> Self {
        Self::new()
    }
}

impl GripperTransport for SimGripper {
    fn actuate(&self, command: GripCommand) -> Result<(), CellError> {
        debug!(command = %command, "sim gripper actuating");
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

/// Scripted detection source: a queue of objects, each a queue of readings.
/// A reading is consumed per poll; consuming an object's centred reading
/// removes the object from view (it is about to be picked). An object whose
/// readings run out uncentred simply vanishes, which is how "object lost"
/// scenarios are scripted.
pub struct ScriptedDetections {
    objects: VecDeque<VecDeque<Detection>>,
}

impl ScriptedDetections {
    pub fn new() -> Self {
        Self {
            objects: VecDeque::new(),
        }
    }

    /// Append an object described by its successive readings.
    pub fn push_object(&mut self, readings: Vec<Detection>) {
        self.objects.push_back(readings.into());
    }

    /// Convenience: an object that reads off-centre for `drift_polls`
    /// readings, then centred at (x, y).
    pub fn push_drifting_object(&mut self, x: f64, y: f64, drift_polls: usize) {
        let mut readings = Vec::new();
        for i in 0..drift_polls {
            readings.push(Detection {
                x_mm: x + 15.0 * (drift_polls - i) as f64,
                y_mm: y,
                width_mm: 40.0,
                height_mm: 60.0,
                centered: false,
            });
        }
        readings.push(Detection {
            x_mm: x,
            y_mm: y,
            width_mm: 40.0,
            height_mm: 60.0,
            centered: true,
        });
        self.push_object(readings);
    }

    pub fn remaining_objects(&self) -> usize {
        self.objects.len()
    }
}

impl Default for ScriptedDetections {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionSource for ScriptedDetections {
    fn poll_detection(&mut self) -> Option<Detection> {
        let readings = self.objects.front_mut()?;
        let reading = readings.pop_front();
        if readings.is_empty() || reading.is_some_and(|r| r.centered) {
            self.objects.pop_front();
        }
        reading
    }
}

/// Classifier that cycles through a fixed bin sequence.
pub struct FixedClassifier {
    sequence: Vec<BinId>,
    next: usize,
}

impl FixedClassifier {
    pub fn always(bin: BinId) -> Self {
        Self::cycling(vec![bin])
    }

    pub fn cycling(sequence: Vec<BinId>) -> Self {
        Self { sequence, next: 0 }
    }
}

impl Classifier for FixedClassifier {
    fn classify(&mut self) -> Result<BinId, CellError> {
        if self.sequence.is_empty() {
            return Err(CellError::Classification("no bins configured".into()));
        }
        let bin = self.sequence[self.next % self.sequence.len()];
        self.next += 1;
        Ok(bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sim_arm_readiness_follows_latency() {
        let arm = SimArm::with_latency(Duration::from_millis(300));
        assert!(arm.is_ready_to_move());

        arm.goto(PoseTarget::height(330.0)).unwrap();
        assert!(!arm.is_ready_to_move());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(arm.is_ready_to_move());
        assert_eq!(arm.pose().z, 330.0);
    }

    #[test]
    fn test_scripted_object_vanishes_after_centered_reading() {
        let mut source = ScriptedDetections::new();
        source.push_drifting_object(100.0, 200.0, 2);

        assert!(!source.poll_detection().unwrap().centered);
        assert!(!source.poll_detection().unwrap().centered);
        let centered = source.poll_detection().unwrap();
        assert!(centered.centered);
        assert_eq!(centered.x_mm, 100.0);
        assert!(source.poll_detection().is_none());
    }

    #[test]
    fn test_scripted_object_can_be_lost() {
        let mut source = ScriptedDetections::new();
        source.push_object(vec![Detection {
            x_mm: 0.0,
            y_mm: 0.0,
            width_mm: 10.0,
            height_mm: 10.0,
            centered: false,
        }]);

        assert!(source.poll_detection().is_some());
        assert!(source.poll_detection().is_none());
    }

    #[test]
    fn test_fixed_classifier_cycles() {
        let mut classifier =
            FixedClassifier::cycling(vec![BinId::new(0), BinId::new(2)]);
        assert_eq!(classifier.classify().unwrap(), BinId::new(0));
        assert_eq!(classifier.classify().unwrap(), BinId::new(2));
        assert_eq!(classifier.classify().unwrap(), BinId::new(0));
    }
}
