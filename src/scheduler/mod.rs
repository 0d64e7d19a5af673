//! Cooperative action scheduler.
//!
//! One bounded channel is the FIFO action queue; one worker task pulls a
//! single [`Action`] at a time and suspends on the tokio timer for delays
//! and condition polls. Submitters never block: [`Scheduler::enqueue`]
//! either appends or fails fast with [`SchedulerError::QueueFull`].
//!
//! Ordering guarantee: actions execute in strict enqueue order, and a
//! `WaitUntil` at the head of the queue is a barrier for everything behind
//! it until its predicate holds.

mod worker;

pub use worker::SchedulerWorker;

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

/// Default interval between condition polls, matching the 100 ms cadence the
/// arm's readiness flag is sampled at.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on the action queue. One pick-and-place chain is around
/// thirty actions; the bound exists to surface runaway submission, not to
/// ration memory.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

type Callback = Box<dyn FnOnce() + Send + 'static>;
type Predicate = Box<dyn FnMut() -> bool + Send + 'static>;

/// One schedulable unit of work.
pub enum Action {
    /// Resume after an elapsed time.
    Delay { duration: Duration },

    /// Run a procedure now. The label identifies the action in logs and
    /// faults.
    Immediate { label: String, callback: Callback },

    /// Re-check a predicate at the poll interval; resume only when it
    /// returns true. An optional deadline converts an endless stall into a
    /// reported [`SchedulerError::Stalled`].
    WaitUntil {
        label: String,
        predicate: Predicate,
        deadline: Option<Duration>,
    },
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delay { duration } => f.debug_struct("Delay").field("duration", duration).finish(),
            Self::Immediate { label, .. } => {
                f.debug_struct("Immediate").field("label", label).finish()
            }
            Self::WaitUntil { label, deadline, .. } => f
                .debug_struct("WaitUntil")
                .field("label", label)
                .field("deadline", deadline)
                .finish(),
        }
    }
}

/// Errors surfaced by the scheduler, either to submitters (`QueueFull`,
/// `Closed`) or out of the worker loop (`Stalled`, `CallbackPanicked`).
#[derive(Debug, Clone)]
pub enum SchedulerError {
    /// The bounded queue rejected the insert. Fatal to the submission, not
    /// to the scheduler.
    QueueFull,

    /// The worker has exited; the queue no longer accepts actions.
    Closed,

    /// A `WaitUntil` deadline elapsed before its predicate held.
    Stalled { label: String, waited: Duration },

    /// A callback or predicate panicked; the worker halted rather than
    /// advance a hardware chain past a step whose side effects are unknown.
    CallbackPanicked { label: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "action queue is full"),
            Self::Closed => write!(f, "scheduler is closed"),
            Self::Stalled { label, waited } => write!(
                f,
                "action `{}` stalled: condition not met after {:.1}s",
                label,
                waited.as_secs_f64()
            ),
            Self::CallbackPanicked { label } => {
                write!(f, "action `{}` panicked", label)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Tuning for a scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between `WaitUntil` predicate polls.
    pub poll_interval: Duration,
    /// Bound on the action queue.
    pub queue_capacity: usize,
    /// Default deadline applied to every `WaitUntil`; `None` waits forever.
    pub wait_deadline: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            wait_deadline: None,
        }
    }
}

/// Submission handle to the action queue. Cheap to clone; every clone feeds
/// the same single worker. Dropping all handles lets the worker drain the
/// queue and exit.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::Sender<Action>,
    wait_deadline: Option<Duration>,
}

impl Scheduler {
    /// Create a scheduler and its worker. The worker must be driven (via
    /// [`SchedulerWorker::run`] or [`SchedulerWorker::spawn`]) for any
    /// enqueued action to execute.
    pub fn new(config: SchedulerConfig) -> (Self, SchedulerWorker) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let scheduler = Self {
            tx,
            wait_deadline: config.wait_deadline,
        };
        let worker = SchedulerWorker::new(rx, config.poll_interval);
        (scheduler, worker)
    }

    /// Append an action to the tail of the queue. Never blocks.
    pub fn enqueue(&self, action: Action) -> Result<(), SchedulerError> {
        self.tx.try_send(action).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SchedulerError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SchedulerError::Closed,
        })
    }

    /// Schedule a procedure to run in queue order.
    pub fn run(
        &self,
        label: impl Into<String>,
        callback: impl FnOnce() + Send + 'static,
    ) -> Result<(), SchedulerError> {
        self.enqueue(Action::Immediate {
            label: label.into(),
            callback: Box::new(callback),
        })
    }

    /// Schedule a pause of the given duration.
    pub fn delay(&self, duration: Duration) -> Result<(), SchedulerError> {
        self.enqueue(Action::Delay { duration })
    }

    /// Schedule a wait for a condition, using the configured default
    /// deadline.
    pub fn wait_until(
        &self,
        label: impl Into<String>,
        predicate: impl FnMut() -> bool + Send + 'static,
    ) -> Result<(), SchedulerError> {
        self.wait_until_with_deadline(label, predicate, self.wait_deadline)
    }

    /// Schedule a wait for a condition with an explicit deadline override.
    pub fn wait_until_with_deadline(
        &self,
        label: impl Into<String>,
        predicate: impl FnMut() -> bool + Send + 'static,
        deadline: Option<Duration>,
    ) -> Result<(), SchedulerError> {
        self.enqueue(Action::WaitUntil {
            label: label.into(),
            predicate: Box::new(predicate),
            deadline,
        })
    }

    /// Schedule a procedure immediately followed by a wait on a condition:
    /// "fire this, then don't proceed until the world confirms it settled".
    /// This is the idiom behind every hardware coordinator call.
    pub fn run_then_wait_until(
        &self,
        label: impl Into<String>,
        callback: impl FnOnce() + Send + 'static,
        predicate: impl FnMut() -> bool + Send + 'static,
    ) -> Result<(), SchedulerError> {
        let label = label.into();
        self.run(label.clone(), callback)?;
        self.wait_until(label, predicate)
    }

    /// Enqueue a marker that fires a oneshot when the worker reaches it.
    /// Awaiting the receiver observes that everything enqueued before the
    /// marker has completed. The receiver errs if the worker halts first.
    pub fn barrier(&self) -> Result<oneshot::Receiver<()>, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.run("barrier", move || {
            let _ = tx.send(());
        })?;
        Ok(rx)
    }

    /// Whether the worker has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
