//! Collaborator contracts the cell consumes. Image capture, the detection
//! and classification models, pixel calibration, and the wire transports
//! all live behind these traits; the crate ships simulated implementations
//! in [`crate::sim`] and real hardware backends plug in from outside.

use crate::error::CellError;
use crate::types::{BinId, Detection, GripCommand, PoseTarget};

/// Supplies, per frame, whether an object is present and where. Calibration
/// from image coordinates to millimetres happens behind this trait.
pub trait DetectionSource: Send {
    /// The latest reading, or `None` if no object is in view.
    fn poll_detection(&mut self) -> Option<Detection>;
}

/// Assigns a detected object to a destination bin.
pub trait Classifier: Send {
    fn classify(&mut self) -> Result<BinId, CellError>;
}

/// Command channel to the arm, plus the side-channel readiness query the
/// motion coordinator polls. No acknowledgment of command receipt is
/// assumed beyond eventual readiness.
pub trait MotionTransport: Send + Sync {
    /// Submit a move toward the target. Returns once the command is
    /// accepted, not once the motion completes.
    fn goto(&self, target: PoseTarget) -> Result<(), CellError>;

    /// Whether the arm is idle and able to take the next motion command.
    fn is_ready_to_move(&self) -> bool;
}

/// Command channel to the gripper. The command set is closed; there is no
/// completion signal, which is why the actuation coordinator substitutes a
/// fixed dwell.
pub trait GripperTransport: Send + Sync {
    fn actuate(&self, command: GripCommand) -> Result<(), CellError>;
}
