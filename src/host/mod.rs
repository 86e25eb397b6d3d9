pub(crate) mod job;
pub(crate) mod worker;

pub(crate) use job::{Job, PeriodicJob, PollPayload};
pub(crate) use worker::HostWorker;
