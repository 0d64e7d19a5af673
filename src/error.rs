//! Error types for cell coordination.

use std::fmt;

use crate::scheduler::SchedulerError;
use crate::types::BinId;

/// Errors that can occur while admitting an object or driving the cell.
#[derive(Debug, Clone)]
pub enum CellError {
    /// The action queue rejected the submission; nothing was scheduled.
    QueueFull,

    /// The scheduler worker has exited and no longer accepts actions.
    SchedulerClosed,

    /// A raw string at a boundary (config, CLI) named a command the gripper
    /// does not accept.
    InvalidGripCommand(String),

    /// The centering loop exhausted its attempt budget without a centred
    /// reading.
    CenteringFailed { attempts: u32 },

    /// The object disappeared from view mid-admission.
    ObjectLost,

    /// The classifier returned a bin with no entry in the bin map.
    UnknownBin(BinId),

    /// The classifier failed to produce a destination bin.
    Classification(String),

    /// A motion or gripper submission failed at the transport.
    Transport(String),
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "action queue is full, cannot schedule"),
            Self::SchedulerClosed => write!(f, "scheduler worker has exited"),
            Self::InvalidGripCommand(cmd) => {
                write!(f, "gripper does not accept command `{}`", cmd)
            }
            Self::CenteringFailed { attempts } => {
                write!(f, "object not centred after {} attempts", attempts)
            }
            Self::ObjectLost => write!(f, "object disappeared during admission"),
            Self::UnknownBin(bin) => write!(f, "no coordinates configured for {}", bin),
            Self::Classification(msg) => write!(f, "classification failed: {}", msg),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for CellError {}

impl From<SchedulerError> for CellError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::QueueFull => Self::QueueFull,
            SchedulerError::Closed => Self::SchedulerClosed,
            // Worker-side faults never reach submitters directly; map them
            // to the closed state a submitter would observe next.
            SchedulerError::Stalled { .. } | SchedulerError::CallbackPanicked { .. } => {
                Self::SchedulerClosed
            }
        }
    }
}
