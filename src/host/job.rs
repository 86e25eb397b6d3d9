//! # Jobs queued to a host worker.
//!
//! [`Job`] is the uniform unit of work a worker drains from its FIFO queue.
//! Command jobs carry a type-erased completion adapter that closes over the
//! typed [`Promise`](crate::Promise) sender, so the queue itself stays
//! monomorphic.
//!
//! ## Rules
//! - A job owns its completion slot; whoever consumes the job must complete
//!   it exactly once ([`Job::fail`]/[`Job::cancel`] for the non-executing
//!   paths).
//! - Periodic jobs report back to the scheduler after execution; command
//!   jobs only feed their promise.

use tokio::sync::oneshot;

use crate::error::{ControlError, RpcErrorKind};
use crate::promise::{promise, Promise};
use crate::rpc::{Request, Response};
use crate::types::PeriodicTask;

/// Type-erased completion of a command job.
pub(crate) type CommandAdapter = Box<dyn FnOnce(Result<Response, ControlError>) + Send>;

/// Scheduler-provided inputs of a periodic poll.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PollPayload {
    /// Last seen sequence number (messages/notices polls).
    pub seqno: u64,
    /// Restrict task polls to active workunits.
    pub active_only: bool,
}

/// One scheduled periodic poll.
#[derive(Debug)]
pub(crate) struct PeriodicJob {
    pub task: PeriodicTask,
    pub payload: PollPayload,
}

impl PeriodicJob {
    /// Builds the wire request for this poll.
    pub(crate) fn request(&self) -> Request {
        match self.task {
            PeriodicTask::CcStatus => Request::CcStatus,
            PeriodicTask::ClientState => Request::ClientState,
            PeriodicTask::DiskUsage => Request::DiskUsage,
            PeriodicTask::FileTransfers => Request::FileTransfers,
            PeriodicTask::Messages => Request::Messages {
                seqno: self.payload.seqno,
            },
            PeriodicTask::Notices => Request::Notices {
                seqno: self.payload.seqno,
            },
            PeriodicTask::ProjectStatus => Request::ProjectStatus,
            PeriodicTask::Statistics => Request::Statistics,
            PeriodicTask::Tasks => Request::Tasks {
                active_only: self.payload.active_only,
            },
        }
    }
}

/// A unit of work queued to a host worker.
pub(crate) enum Job {
    /// Establish the connection; `done` reports success to the notification
    /// task spawned by `add_host`.
    Connect {
        url: String,
        port: u16,
        done: oneshot::Sender<bool>,
    },
    /// Run the authorization sequence and broadcast the outcome.
    Authorize { password: String },
    /// Ad-hoc command with a promise-backed completion.
    Command {
        request: Request,
        complete: CommandAdapter,
    },
    /// Scheduler-issued periodic poll.
    Periodic(PeriodicJob),
}

impl Job {
    /// Builds a command job plus the promise its adapter feeds.
    ///
    /// `map` extracts the typed result from the response; a response of the
    /// wrong shape is reported as a parse error by the adapters built on top
    /// of this.
    pub(crate) fn command<T, F>(request: Request, map: F) -> (Job, Promise<T>)
    where
        T: Send + 'static,
        F: FnOnce(Response) -> Result<T, ControlError> + Send + 'static,
    {
        let (completion, pending) = promise();
        let complete = Box::new(move |result: Result<Response, ControlError>| {
            completion.complete(result.and_then(map));
        });
        (Job::Command { request, complete }, pending)
    }

    /// Completes the job with `error` without executing it.
    ///
    /// Connect jobs drop their notification channel instead: the add-host
    /// notification task treats that as "host gone, stay silent".
    pub(crate) fn fail(self, error: ControlError) {
        match self {
            Job::Command { complete, .. } => complete(Err(error)),
            Job::Connect { .. } | Job::Authorize { .. } | Job::Periodic(_) => {}
        }
    }

    /// Completes the job with a cancelled outcome (worker shutdown).
    pub(crate) fn cancel(self) {
        self.fail(ControlError::cancelled());
    }
}

/// Maps a wrong-shaped response to a parse error; used by the facade's
/// completion adapters.
pub(crate) fn unexpected_response(response: &Response) -> ControlError {
    ControlError::Rpc {
        kind: RpcErrorKind::Parse,
        message: format!("unexpected response variant: {response:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_requests_carry_their_payload() {
        let job = PeriodicJob {
            task: PeriodicTask::Messages,
            payload: PollPayload {
                seqno: 42,
                active_only: false,
            },
        };
        assert!(matches!(job.request(), Request::Messages { seqno: 42 }));

        let job = PeriodicJob {
            task: PeriodicTask::Tasks,
            payload: PollPayload {
                seqno: 0,
                active_only: true,
            },
        };
        assert!(matches!(job.request(), Request::Tasks { active_only: true }));
    }

    #[tokio::test]
    async fn failing_a_command_job_feeds_the_promise() {
        let (job, pending) = Job::command(Request::CcStatus, |_| Ok(true));
        job.fail(ControlError::Shutdown);
        assert!(matches!(pending.await, Err(ControlError::Shutdown)));
    }
}
