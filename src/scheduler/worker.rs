//! The single worker task that drains the action queue.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use super::{Action, SchedulerError};

/// A stall warning is emitted once per this many predicate polls (5 s at
/// the default 100 ms interval).
const STALL_WARN_EVERY: u32 = 50;

/// Owns the receiving end of the action queue and executes one action at a
/// time. All hardware interaction in the cell funnels through here; strict
/// FIFO ordering follows from there being exactly one receiver holding one
/// action at a time.
pub struct SchedulerWorker {
    rx: mpsc::Receiver<Action>,
    poll_interval: Duration,
}

impl SchedulerWorker {
    pub(super) fn new(rx: mpsc::Receiver<Action>, poll_interval: Duration) -> Self {
        Self { rx, poll_interval }
    }

    /// Spawn the worker onto the current runtime.
    pub fn spawn(self) -> JoinHandle<Result<(), SchedulerError>> {
        tokio::spawn(self.run())
    }

    /// Process actions until every submission handle is dropped (the queue
    /// then drains and the worker exits cleanly) or a fault halts the loop.
    ///
    /// An empty queue parks here in `recv`, with no idle polling. The next
    /// enqueue wakes the worker immediately.
    pub async fn run(mut self) -> Result<(), SchedulerError> {
        debug!(poll_interval_ms = self.poll_interval.as_millis() as u64, "scheduler worker started");

        while let Some(action) = self.rx.recv().await {
            self.step(action).await?;
        }

        debug!("action queue closed, scheduler worker exiting");
        Ok(())
    }

    async fn step(&mut self, action: Action) -> Result<(), SchedulerError> {
        match action {
            Action::Delay { duration } => {
                trace!(delay_ms = duration.as_millis() as u64, "delaying");
                tokio::time::sleep(duration).await;
            }
            Action::Immediate { label, callback } => {
                trace!(action = %label, "running");
                if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
                    error!(action = %label, "callback panicked, halting scheduler");
                    return Err(SchedulerError::CallbackPanicked { label });
                }
            }
            Action::WaitUntil {
                label,
                mut predicate,
                deadline,
            } => {
                let started = Instant::now();
                let mut polls: u32 = 0;

                loop {
                    let holds = match panic::catch_unwind(AssertUnwindSafe(|| predicate())) {
                        Ok(holds) => holds,
                        Err(_) => {
                            error!(action = %label, "predicate panicked, halting scheduler");
                            return Err(SchedulerError::CallbackPanicked { label });
                        }
                    };
                    if holds {
                        trace!(action = %label, polls, "condition met");
                        break;
                    }

                    let waited = started.elapsed();
                    if let Some(deadline) = deadline {
                        if waited >= deadline {
                            error!(
                                action = %label,
                                waited_ms = waited.as_millis() as u64,
                                "condition never met within deadline"
                            );
                            return Err(SchedulerError::Stalled { label, waited });
                        }
                    }

                    polls += 1;
                    if polls % STALL_WARN_EVERY == 0 {
                        warn!(
                            action = %label,
                            waited_ms = waited.as_millis() as u64,
                            "still waiting on condition"
                        );
                    }

                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
        Ok(())
    }
}
