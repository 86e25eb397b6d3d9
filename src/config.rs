//! # Controller-wide polling configuration.
//!
//! [`Configuration`] holds the interval table shared by all hosts and one
//! flag row per registered host:
//!
//! - `schedule_enabled`: whether the periodic scheduler may poll the host.
//! - `active_only_tasks`: whether task polls request active workunits only.
//!
//! ## Rules
//! - Reads return copies; no reference escapes the internal locks.
//! - The scheduler works from [`Configuration::snapshot_intervals`] so its
//!   loop does not take the interval lock on every tick.
//! - Hosts start with both flags off: a freshly added host is not polled
//!   until scheduling is enabled explicitly.

use std::sync::Mutex;

use dashmap::DashMap;

use crate::types::{PeriodicTask, PERIODIC_TASK_COUNT};

/// Copy of the interval table, in [`PeriodicTask::ALL`] order (seconds).
pub(crate) type Intervals = [u32; PERIODIC_TASK_COUNT];

#[derive(Clone, Copy, Default)]
struct HostFlags {
    schedule_enabled: bool,
    active_only_tasks: bool,
}

/// Interval table plus per-host scheduling flags.
pub(crate) struct Configuration {
    intervals: Mutex<Intervals>,
    hosts: DashMap<String, HostFlags>,
}

impl Configuration {
    pub(crate) fn new() -> Self {
        let mut intervals = [0; PERIODIC_TASK_COUNT];
        for task in PeriodicTask::ALL {
            intervals[task.index()] = task.default_interval().as_secs() as u32;
        }
        Self {
            intervals: Mutex::new(intervals),
            hosts: DashMap::new(),
        }
    }

    pub(crate) fn interval(&self, task: PeriodicTask) -> u32 {
        self.intervals.lock().unwrap()[task.index()]
    }

    /// Sets the polling interval; `seconds` has been validated as positive
    /// by the facade.
    pub(crate) fn set_interval(&self, task: PeriodicTask, seconds: u32) {
        self.intervals.lock().unwrap()[task.index()] = seconds;
    }

    pub(crate) fn snapshot_intervals(&self) -> Intervals {
        *self.intervals.lock().unwrap()
    }

    /// Creates the flag row for a host; both flags start off.
    pub(crate) fn add_host(&self, host: &str) {
        self.hosts.insert(host.to_string(), HostFlags::default());
    }

    pub(crate) fn remove_host(&self, host: &str) {
        self.hosts.remove(host);
    }

    /// Unknown hosts report `false`; the row may already be gone while a
    /// removal is in progress.
    pub(crate) fn schedule_enabled(&self, host: &str) -> bool {
        self.hosts.get(host).map_or(false, |f| f.schedule_enabled)
    }

    pub(crate) fn set_schedule_enabled(&self, host: &str, value: bool) {
        if let Some(mut flags) = self.hosts.get_mut(host) {
            flags.schedule_enabled = value;
        }
    }

    pub(crate) fn active_only_tasks(&self, host: &str) -> bool {
        self.hosts.get(host).map_or(false, |f| f.active_only_tasks)
    }

    pub(crate) fn set_active_only_tasks(&self, host: &str, value: bool) {
        if let Some(mut flags) = self.hosts.get_mut(host) {
            flags.active_only_tasks = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_task_table() {
        let config = Configuration::new();
        assert_eq!(config.interval(PeriodicTask::CcStatus), 1);
        assert_eq!(config.interval(PeriodicTask::DiskUsage), 60);
        assert_eq!(config.interval(PeriodicTask::Notices), 60);
        assert_eq!(config.interval(PeriodicTask::Statistics), 60);
        assert_eq!(config.interval(PeriodicTask::Tasks), 1);
    }

    #[test]
    fn interval_roundtrip() {
        let config = Configuration::new();
        config.set_interval(PeriodicTask::Messages, 17);
        assert_eq!(config.interval(PeriodicTask::Messages), 17);
        assert_eq!(
            config.snapshot_intervals()[PeriodicTask::Messages.index()],
            17
        );
    }

    #[test]
    fn host_flags_default_off_and_roundtrip() {
        let config = Configuration::new();
        config.add_host("h");
        assert!(!config.schedule_enabled("h"));
        assert!(!config.active_only_tasks("h"));

        config.set_schedule_enabled("h", true);
        config.set_active_only_tasks("h", true);
        assert!(config.schedule_enabled("h"));
        assert!(config.active_only_tasks("h"));

        config.remove_host("h");
        assert!(!config.schedule_enabled("h"));
    }

    #[test]
    fn unknown_host_flags_are_noops() {
        let config = Configuration::new();
        config.set_schedule_enabled("ghost", true);
        assert!(!config.schedule_enabled("ghost"));
    }
}
