//! # Per-host scheduling state.
//!
//! One [`TaskSlot`] per host and periodic task kind, plus the incremental
//! poll state (message/notice sequence numbers) and the host's queue sender.
//! All of it lives behind the scheduler lock; nothing here synchronizes on
//! its own.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::config::Intervals;
use crate::host::Job;
use crate::types::{PeriodicTask, PERIODIC_TASK_COUNT};

/// Scheduling state of one (host, kind) pair.
#[derive(Debug)]
pub(crate) struct TaskSlot {
    pub task: PeriodicTask,
    /// `None` means "never ran": the first tick after enabling fires
    /// immediately, whatever the interval.
    pub last_execution: Option<Instant>,
    /// A job for this slot is queued or in flight; at most one at a time.
    pub pending: bool,
}

impl TaskSlot {
    fn new(task: PeriodicTask) -> Self {
        Self {
            task,
            last_execution: None,
            pending: false,
        }
    }

    /// Whether the slot should fire at `now` under `intervals`.
    pub(crate) fn due(&self, intervals: &Intervals, now: Instant) -> bool {
        if self.pending {
            return false;
        }
        match self.last_execution {
            None => true,
            Some(at) => {
                now >= at + Duration::from_secs(u64::from(intervals[self.task.index()]))
            }
        }
    }
}

/// Last seen sequence numbers for the incremental polls.
#[derive(Debug, Default)]
pub(crate) struct PollState {
    pub messages_seqno: u64,
    pub notices_seqno: u64,
}

/// All scheduler state for one registered host.
pub(crate) struct HostEntry {
    pub slots: [TaskSlot; PERIODIC_TASK_COUNT],
    pub poll: PollState,
    /// Queue handle of the host's worker; a failed send means the worker is
    /// gone and the poll is dropped.
    pub queue: mpsc::UnboundedSender<Job>,
}

impl HostEntry {
    pub(crate) fn new(queue: mpsc::UnboundedSender<Job>) -> Self {
        Self {
            slots: PeriodicTask::ALL.map(TaskSlot::new),
            poll: PollState::default(),
            queue,
        }
    }

    pub(crate) fn slot_mut(&mut self, task: PeriodicTask) -> &mut TaskSlot {
        &mut self.slots[task.index()]
    }
}
