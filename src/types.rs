//! # Domain types exchanged with remote compute daemons.
//!
//! Payload records are carried through the controller as opaque values; the
//! controller itself only reads the fields that influence scheduling
//! (`seqno` on message/notice batches, the `success` flag on acks). Their
//! remaining fields mirror the daemon's records and are passed through to
//! [`PeriodicTaskHandler`](crate::PeriodicTaskHandler) observers untouched.

use std::time::Duration;

/// One of the nine periodic state-refresh polls.
///
/// Each registered host owns one scheduling slot per variant; intervals are
/// configured per variant via
/// [`Controller::set_periodic_task_interval`](crate::Controller::set_periodic_task_interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodicTask {
    /// Run/gpu/network mode and suspend reasons.
    CcStatus,
    /// Full client state snapshot.
    ClientState,
    /// Per-project disk usage.
    DiskUsage,
    /// Pending and active file transfers.
    FileTransfers,
    /// Message log; incremental via seqno.
    Messages,
    /// Notices; incremental via seqno.
    Notices,
    /// Attached projects and their status.
    ProjectStatus,
    /// Credit statistics.
    Statistics,
    /// Workunits/results, optionally active-only.
    Tasks,
}

/// Number of periodic task kinds.
pub(crate) const PERIODIC_TASK_COUNT: usize = 9;

impl PeriodicTask {
    /// All kinds, in interval-table order.
    pub const ALL: [PeriodicTask; PERIODIC_TASK_COUNT] = [
        PeriodicTask::CcStatus,
        PeriodicTask::ClientState,
        PeriodicTask::DiskUsage,
        PeriodicTask::FileTransfers,
        PeriodicTask::Messages,
        PeriodicTask::Notices,
        PeriodicTask::ProjectStatus,
        PeriodicTask::Statistics,
        PeriodicTask::Tasks,
    ];

    /// Position in the interval table.
    pub(crate) fn index(self) -> usize {
        match self {
            PeriodicTask::CcStatus => 0,
            PeriodicTask::ClientState => 1,
            PeriodicTask::DiskUsage => 2,
            PeriodicTask::FileTransfers => 3,
            PeriodicTask::Messages => 4,
            PeriodicTask::Notices => 5,
            PeriodicTask::ProjectStatus => 6,
            PeriodicTask::Statistics => 7,
            PeriodicTask::Tasks => 8,
        }
    }

    /// Default polling interval for this kind.
    pub fn default_interval(self) -> Duration {
        let secs = match self {
            PeriodicTask::CcStatus => 1,
            PeriodicTask::ClientState => 1,
            PeriodicTask::DiskUsage => 60,
            PeriodicTask::FileTransfers => 1,
            PeriodicTask::Messages => 1,
            PeriodicTask::Notices => 60,
            PeriodicTask::ProjectStatus => 1,
            PeriodicTask::Statistics => 60,
            PeriodicTask::Tasks => 1,
        };
        Duration::from_secs(secs)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PeriodicTask::CcStatus => "cc_status",
            PeriodicTask::ClientState => "client_state",
            PeriodicTask::DiskUsage => "disk_usage",
            PeriodicTask::FileTransfers => "file_transfers",
            PeriodicTask::Messages => "messages",
            PeriodicTask::Notices => "notices",
            PeriodicTask::ProjectStatus => "project_status",
            PeriodicTask::Statistics => "statistics",
            PeriodicTask::Tasks => "tasks",
        }
    }
}

/// Run mode for cpu/gpu/network work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Always work.
    Always,
    /// Work according to preferences.
    Auto,
    /// Never work.
    Never,
    /// Restore the previously configured mode.
    Restore,
}

/// Operation on a single workunit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOp {
    Abort,
    Resume,
    Suspend,
}

/// Operation on an attached project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOp {
    AllowMoreWork,
    Detach,
    DetachWhenDone,
    DontDetachWhenDone,
    NoMoreWork,
    Reset,
    Resume,
    Suspend,
    Update,
}

/// Operation on a file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTransferOp {
    Abort,
    Retry,
}

/// Which set of global preferences to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalPrefsMode {
    /// The preferences file as stored on disk.
    File,
    /// The local override file.
    Override,
    /// The preferences currently in effect.
    Working,
}

/// Snapshot of the daemon's run state.
#[derive(Debug, Clone, Default)]
pub struct CcStatus {
    pub task_mode: Option<RunMode>,
    pub gpu_mode: Option<RunMode>,
    pub network_mode: Option<RunMode>,
    pub task_suspend_reason: i32,
    pub network_suspend_reason: i32,
}

/// Full client state snapshot.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub core_client_version: String,
    pub platform_name: String,
    pub projects: Vec<Project>,
    pub tasks: Vec<TaskInfo>,
}

/// Disk usage summary.
#[derive(Debug, Clone, Default)]
pub struct DiskUsage {
    pub total: f64,
    pub free: f64,
}

/// One pending or active file transfer.
#[derive(Debug, Clone, Default)]
pub struct FileTransfer {
    pub project_url: String,
    pub name: String,
    pub nbytes: f64,
    pub is_upload: bool,
}

/// One entry of the daemon's message log.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub seqno: u64,
    pub project: String,
    pub body: String,
    pub priority: i32,
    pub timestamp: i64,
}

/// A batch of messages.
///
/// `seqno` is the highest sequence number contained in the batch; the
/// controller echoes it on the next poll so the daemon only sends newer
/// entries.
#[derive(Debug, Clone, Default)]
pub struct Messages {
    pub seqno: u64,
    pub messages: Vec<Message>,
}

/// One notice published by the daemon or a project.
#[derive(Debug, Clone, Default)]
pub struct Notice {
    pub seqno: u64,
    pub title: String,
    pub description: String,
    pub create_time: i64,
}

/// A batch of notices; `seqno` works like [`Messages::seqno`].
#[derive(Debug, Clone, Default)]
pub struct Notices {
    pub seqno: u64,
    pub notices: Vec<Notice>,
}

/// Status of one attached project.
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub master_url: String,
    pub project_name: String,
    pub suspended_via_gui: bool,
    pub dont_request_more_work: bool,
}

/// Credit statistics of one project.
#[derive(Debug, Clone, Default)]
pub struct ProjectStatistics {
    pub master_url: String,
    pub user_total_credit: f64,
    pub host_total_credit: f64,
}

/// Credit statistics for all attached projects.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub projects: Vec<ProjectStatistics>,
}

/// One workunit/result known to the daemon.
#[derive(Debug, Clone, Default)]
pub struct TaskInfo {
    pub name: String,
    pub project_url: String,
    pub active: bool,
    pub suspended_via_gui: bool,
    pub fraction_done: f64,
}

/// Global computing preferences.
#[derive(Debug, Clone, Default)]
pub struct GlobalPreferences {
    pub run_on_batteries: bool,
    pub run_if_user_active: bool,
    pub cpu_usage_limit: f64,
    pub max_ncpus_pct: f64,
    pub disk_max_used_gb: f64,
    pub idle_time_to_run: f64,
}

/// Selects which [`GlobalPreferences`] fields a save should touch.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalPreferencesMask {
    pub run_on_batteries: bool,
    pub run_if_user_active: bool,
    pub cpu_usage_limit: bool,
    pub max_ncpus_pct: bool,
    pub disk_max_used_gb: bool,
    pub idle_time_to_run: bool,
}

/// Result of one periodic poll, delivered to
/// [`PeriodicTaskHandler`](crate::PeriodicTaskHandler) observers.
#[derive(Debug, Clone)]
pub enum PollData {
    CcStatus(CcStatus),
    ClientState(ClientState),
    DiskUsage(DiskUsage),
    FileTransfers(Vec<FileTransfer>),
    Messages(Messages),
    Notices(Notices),
    Projects(Vec<Project>),
    Statistics(Statistics),
    Tasks(Vec<TaskInfo>),
}

impl PollData {
    /// The periodic task this payload belongs to.
    pub fn task(&self) -> PeriodicTask {
        match self {
            PollData::CcStatus(_) => PeriodicTask::CcStatus,
            PollData::ClientState(_) => PeriodicTask::ClientState,
            PollData::DiskUsage(_) => PeriodicTask::DiskUsage,
            PollData::FileTransfers(_) => PeriodicTask::FileTransfers,
            PollData::Messages(_) => PeriodicTask::Messages,
            PollData::Notices(_) => PeriodicTask::Notices,
            PollData::Projects(_) => PeriodicTask::ProjectStatus,
            PollData::Statistics(_) => PeriodicTask::Statistics,
            PollData::Tasks(_) => PeriodicTask::Tasks,
        }
    }

    /// Sequence number carried by message/notice batches.
    pub(crate) fn seqno(&self) -> Option<u64> {
        match self {
            PollData::Messages(batch) => Some(batch.seqno),
            PollData::Notices(batch) => Some(batch.seqno),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_table_order_matches_indices() {
        for (pos, task) in PeriodicTask::ALL.iter().enumerate() {
            assert_eq!(task.index(), pos);
        }
    }

    #[test]
    fn seqno_only_on_incremental_polls() {
        let batch = PollData::Messages(Messages {
            seqno: 42,
            messages: vec![],
        });
        assert_eq!(batch.seqno(), Some(42));
        assert_eq!(PollData::DiskUsage(DiskUsage::default()).seqno(), None);
    }
}
