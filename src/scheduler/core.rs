//! # Periodic-tasks scheduler.
//!
//! One background task fans timed polls out to every registered host. The
//! [`SchedulerContext`] owns all shared state behind a single lock; the loop,
//! nudges, and the workers' post-execution callbacks are serialized through
//! it, so no scheduling state ever leaks to the workers.
//!
//! ## Loop (cadence 200 ms)
//! ```text
//! loop:
//!   ├── shutdown requested? → stop
//!   ├── every 5th tick: refresh the interval snapshot from Configuration
//!   ├── for each host with scheduling enabled:
//!   │     for each of its 9 slots:
//!   │        due and not pending? → mark pending, enqueue PeriodicJob
//!   └── wait: wakeup notification or 200 ms timeout
//! ```
//!
//! ## Rules
//! - At most one job per (host, kind) is in flight; `pending` enforces it.
//! - A nudge ([`SchedulerContext::reschedule_now`]) resets the slot to
//!   "never ran" and wakes the loop; a nudge while the slot is pending is
//!   dropped (the next pass after completion re-evaluates).
//! - Post-execution updates run on the worker task and take the scheduler
//!   lock briefly after the RPC finished, never the other way around.
//! - Callbacks for hosts already removed are no-ops; they race benignly with
//!   removal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::{Configuration, Intervals};
use crate::host::{Job, PeriodicJob, PollPayload};
use crate::scheduler::slots::HostEntry;
use crate::types::PeriodicTask;

/// Wakeup cadence of the scheduling loop.
const TICK: Duration = Duration::from_millis(200);

/// Ticks between refreshes of the interval snapshot (about once a second).
const INTERVAL_REFRESH_TICKS: u32 = 5;

struct SchedulerState {
    hosts: HashMap<String, HostEntry>,
    shutdown: bool,
}

/// Shared scheduler state; workers hold an `Arc` of this for their
/// post-execution callbacks.
pub(crate) struct SchedulerContext {
    config: Arc<Configuration>,
    state: Mutex<SchedulerState>,
    wakeup: Notify,
}

impl SchedulerContext {
    fn new(config: Arc<Configuration>) -> Self {
        Self {
            config,
            state: Mutex::new(SchedulerState {
                hosts: HashMap::new(),
                shutdown: false,
            }),
            wakeup: Notify::new(),
        }
    }

    /// Registers a host with nine fresh slots. The host is not polled until
    /// scheduling is enabled in the configuration.
    pub(crate) fn add_host(&self, host: &str, queue: mpsc::UnboundedSender<Job>) {
        let mut state = self.state.lock().unwrap();
        state.hosts.insert(host.to_string(), HostEntry::new(queue));
    }

    /// Erases all scheduler state for `host`; unknown hosts are a no-op.
    pub(crate) fn remove_host(&self, host: &str) {
        let mut state = self.state.lock().unwrap();
        state.hosts.remove(host);
    }

    /// Forces the slot's next execution to the current tick. Dropped when
    /// the slot is pending or the host is unknown.
    pub(crate) fn reschedule_now(&self, host: &str, task: PeriodicTask) {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.hosts.get_mut(host) else {
            return;
        };
        let slot = entry.slot_mut(task);
        if !slot.pending {
            slot.last_execution = None;
            self.wakeup.notify_one();
        }
    }

    /// Post-execution callback, invoked by the worker that ran the poll.
    /// Clears `pending`, stamps the execution time, and folds the new
    /// sequence number into the host's poll state.
    pub(crate) fn on_periodic_done(&self, host: &str, task: PeriodicTask, seqno: Option<u64>) {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.hosts.get_mut(host) else {
            return;
        };
        let slot = entry.slot_mut(task);
        slot.last_execution = Some(Instant::now());
        slot.pending = false;
        if let Some(seqno) = seqno {
            match task {
                PeriodicTask::Messages => entry.poll.messages_seqno = seqno,
                PeriodicTask::Notices => entry.poll.notices_seqno = seqno,
                _ => {}
            }
        }
    }

    /// Asks the loop to stop at its next wakeup.
    pub(crate) fn trigger_shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutdown = true;
        self.wakeup.notify_one();
    }

    /// One scheduling pass over all hosts. Returns `false` once shutdown was
    /// requested.
    fn tick(&self, intervals: &Intervals) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.shutdown {
            return false;
        }

        let now = Instant::now();
        for (host, entry) in state.hosts.iter_mut() {
            if !self.config.schedule_enabled(host) {
                continue;
            }
            let HostEntry { slots, poll, queue } = entry;
            for slot in slots.iter_mut() {
                if !slot.due(intervals, now) {
                    continue;
                }
                let payload = PollPayload {
                    seqno: match slot.task {
                        PeriodicTask::Messages => poll.messages_seqno,
                        PeriodicTask::Notices => poll.notices_seqno,
                        _ => 0,
                    },
                    active_only: slot.task == PeriodicTask::Tasks
                        && self.config.active_only_tasks(host),
                };
                let job = Job::Periodic(PeriodicJob {
                    task: slot.task,
                    payload,
                });
                if queue.send(job).is_ok() {
                    slot.pending = true;
                } else {
                    tracing::debug!(
                        host = %host,
                        task = slot.task.as_label(),
                        "worker queue closed, poll dropped"
                    );
                }
            }
        }
        true
    }
}

/// Handle owning the scheduler task.
pub(crate) struct Scheduler {
    context: Arc<SchedulerContext>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Spawns the scheduling loop; must run inside a tokio runtime.
    pub(crate) fn spawn(config: Arc<Configuration>) -> Self {
        let context = Arc::new(SchedulerContext::new(config));
        let join = tokio::spawn(run(Arc::clone(&context)));
        Self {
            context,
            join: Mutex::new(Some(join)),
        }
    }

    /// Shared context handed to workers for post-execution callbacks.
    pub(crate) fn context(&self) -> Arc<SchedulerContext> {
        Arc::clone(&self.context)
    }

    pub(crate) fn add_host(&self, host: &str, queue: mpsc::UnboundedSender<Job>) {
        self.context.add_host(host, queue);
    }

    pub(crate) fn remove_host(&self, host: &str) {
        self.context.remove_host(host);
    }

    pub(crate) fn reschedule_now(&self, host: &str, task: PeriodicTask) {
        self.context.reschedule_now(host, task);
    }

    /// Stops the loop and joins it. Idempotent; later calls are no-ops.
    pub(crate) async fn shutdown(&self) {
        self.context.trigger_shutdown();
        let join = self.join.lock().unwrap().take();
        if let Some(join) = join {
            let _ = join.await;
        }
    }
}

async fn run(context: Arc<SchedulerContext>) {
    tracing::debug!("periodic scheduler started");

    let mut cache_counter = 0;
    let mut intervals = context.config.snapshot_intervals();

    loop {
        if !context.tick(&intervals) {
            break;
        }

        tokio::select! {
            _ = context.wakeup.notified() => {}
            _ = sleep(TICK) => {}
        }

        cache_counter = (cache_counter + 1) % INTERVAL_REFRESH_TICKS;
        if cache_counter == 0 {
            intervals = context.config.snapshot_intervals();
        }
    }

    tracing::debug!("periodic scheduler stopped");
}
