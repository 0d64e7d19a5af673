// Core modules
mod arm;
mod cell;
mod config;
mod error;
mod gate;
mod scheduler;
mod traits;
mod types;
mod workflow;

// Simulated collaborators (tests and the `simulate` command)
pub mod sim;

mod integration_tests;

// Re-export key types and functions
pub use arm::ArmCoordinator;
pub use cell::CellController;
pub use config::{
    ArmSettings, BinSlot, CellConfig, CenteringSettings, GripperSettings, SchedulerSettings,
    WorkflowSettings, resolve_config_path,
};
pub use error::CellError;
pub use gate::ProcessingGate;
pub use scheduler::{
    Action, DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY, Scheduler, SchedulerConfig,
    SchedulerError, SchedulerWorker,
};
pub use traits::{Classifier, DetectionSource, GripperTransport, MotionTransport};
pub use types::{BinId, Detection, GripCommand, ObjectSnapshot, Pose, PoseTarget};
pub use workflow::{BinTarget, WorkflowParams, enqueue_pick_and_place};
