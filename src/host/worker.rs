//! # HostWorker: per-host serial job executor.
//!
//! One worker task per registered host. The worker exclusively owns the
//! host's [`HostConnection`] and drains an unbounded FIFO queue of [`Job`]s;
//! periodic and ad-hoc jobs share the queue and interleave in arrival order.
//!
//! ## Architecture
//! ```text
//! Controller ──schedule(Job)──► [unbounded queue] ──► worker task
//! Scheduler  ──schedule(Job)──►                          │
//!                                                        ├──► HostConnection (serial I/O)
//!                                                        ├──► Promise completion (commands)
//!                                                        ├──► SchedulerContext::on_periodic_done
//!                                                        └──► HandlerRegistry broadcasts
//! ```
//!
//! ## Rules
//! - Jobs complete strictly in enqueue order.
//! - A failed RPC never tears down the worker; it reports through the job's
//!   completion slot (commands) or through `on_host_error` (periodic polls).
//! - A confirmed disconnect marks the host errored but leaves it registered;
//!   only the user removes hosts.
//! - Shutdown cancels the in-flight job through the worker token and
//!   completes every undelivered job with a cancelled outcome, so no promise
//!   is left dangling.
//! - The worker holds no controller/scheduler/configuration lock while the
//!   connection is doing I/O; it takes the scheduler lock only briefly in
//!   `on_periodic_done` after an exchange finished.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ControlError, RpcErrorKind};
use crate::handlers::HandlerRegistry;
use crate::host::job::{unexpected_response, Job};
use crate::rpc::{HostConnection, Response};
use crate::scheduler::SchedulerContext;
use crate::types::{PeriodicTask, PollData};

/// Authorization state of a host, tracked by its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthState {
    Unauthenticated,
    Authorized,
    Failed,
}

/// Handle to one host's worker task.
pub(crate) struct HostWorker {
    queue: mpsc::UnboundedSender<Job>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl HostWorker {
    /// Spawns the worker task owning `connection`.
    pub(crate) fn spawn(
        host: String,
        connection: Box<dyn HostConnection>,
        registry: Arc<HandlerRegistry>,
        scheduler: Arc<SchedulerContext>,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let worker = WorkerLoop {
            host,
            rx,
            connection,
            registry,
            scheduler,
            cancel: cancel.clone(),
            auth: AuthState::Unauthenticated,
            errored: false,
        };
        let join = tokio::spawn(worker.run());

        Self {
            queue,
            cancel,
            join,
        }
    }

    /// Enqueues a job; returns it unconsumed when the queue already closed.
    pub(crate) fn schedule(&self, job: Job) -> Result<(), Job> {
        self.queue.send(job).map_err(|rejected| rejected.0)
    }

    /// A second queue handle for the scheduler's lookup table.
    pub(crate) fn queue(&self) -> mpsc::UnboundedSender<Job> {
        self.queue.clone()
    }

    /// Closes the queue, cancels the in-flight job, drains the rest with a
    /// cancelled outcome, and joins the worker task.
    pub(crate) async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.join.await;
    }
}

struct WorkerLoop {
    host: String,
    rx: mpsc::UnboundedReceiver<Job>,
    connection: Box<dyn HostConnection>,
    registry: Arc<HandlerRegistry>,
    scheduler: Arc<SchedulerContext>,
    cancel: CancellationToken,
    auth: AuthState,
    errored: bool,
}

impl WorkerLoop {
    async fn run(mut self) {
        loop {
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                job = self.rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.execute(job).await;
            if self.cancel.is_cancelled() {
                break;
            }
        }
        self.drain();
    }

    async fn execute(&mut self, job: Job) {
        let cancel = self.cancel.clone();
        match job {
            Job::Connect { url, port, done } => {
                // on cancellation `done` is dropped: the add-host
                // notification task stays silent for a removed host
                let connected = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    connected = self.connection.connect(&url, port) => connected,
                };
                if !connected {
                    tracing::warn!(host = %self.host, url = %url, port, "connect failed");
                    self.errored = true;
                } else {
                    self.errored = false;
                }
                let _ = done.send(connected);
            }
            Job::Authorize { password } => {
                if self.auth == AuthState::Authorized {
                    tracing::debug!(host = %self.host, "re-authorizing");
                }
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    outcome = self.connection.authorize(&password) => outcome,
                };
                match outcome {
                    Ok(true) => {
                        self.auth = AuthState::Authorized;
                        tracing::debug!(host = %self.host, "authorized");
                        self.registry.host_authorized(&self.host).await;
                    }
                    Ok(false) => {
                        self.auth = AuthState::Failed;
                        self.registry.host_authorization_failed(&self.host).await;
                    }
                    Err(error) => {
                        // a transport error is not a rejected password; it
                        // goes through the error channel instead
                        tracing::warn!(host = %self.host, %error, "authorization errored");
                        if error.kind == RpcErrorKind::Disconnected {
                            self.mark_disconnected();
                        }
                        self.auth = AuthState::Failed;
                        self.registry
                            .host_error(
                                &self.host,
                                &ControlError::AuthorizationFailed {
                                    host: self.host.clone(),
                                },
                            )
                            .await;
                    }
                }
            }
            Job::Command { request, complete } => {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ControlError::cancelled()),
                    result = self.connection.execute(request) => result.map_err(ControlError::from),
                };
                if let Err(ControlError::Rpc {
                    kind: RpcErrorKind::Disconnected,
                    ..
                }) = &result
                {
                    self.mark_disconnected();
                }
                complete(result);
            }
            Job::Periodic(job) => {
                let request = job.request();
                let result = tokio::select! {
                    biased;
                    // shutting down; scheduler state for this host is being
                    // torn down as well, so nothing to report back
                    _ = cancel.cancelled() => return,
                    result = self.connection.execute(request) => result,
                };
                match result {
                    Ok(response) => match poll_data(job.task, response) {
                        Ok(data) => {
                            self.scheduler
                                .on_periodic_done(&self.host, job.task, data.seqno());
                            self.registry.poll_completed(&self.host, &data).await;
                        }
                        Err(error) => {
                            self.scheduler.on_periodic_done(&self.host, job.task, None);
                            self.registry.host_error(&self.host, &error).await;
                        }
                    },
                    Err(error) => {
                        tracing::warn!(
                            host = %self.host,
                            task = job.task.as_label(),
                            %error,
                            "periodic poll failed"
                        );
                        if error.kind == RpcErrorKind::Disconnected {
                            self.mark_disconnected();
                        }
                        self.scheduler.on_periodic_done(&self.host, job.task, None);
                        self.registry
                            .host_error(&self.host, &ControlError::from(error))
                            .await;
                    }
                }
            }
        }
    }

    /// Marks the host errored; warns only on the first transition so a dead
    /// daemon does not flood the log at polling cadence.
    fn mark_disconnected(&mut self) {
        if !self.errored {
            tracing::warn!(host = %self.host, "connection to host lost");
            self.errored = true;
        }
    }

    /// Completes every undelivered job with a cancelled outcome.
    fn drain(&mut self) {
        self.rx.close();
        while let Ok(job) = self.rx.try_recv() {
            job.cancel();
        }
    }
}

/// Pairs a poll kind with its response; a wrong-shaped response is a parse
/// error.
fn poll_data(task: PeriodicTask, response: Response) -> Result<PollData, ControlError> {
    let data = match (task, response) {
        (PeriodicTask::CcStatus, Response::CcStatus(v)) => PollData::CcStatus(v),
        (PeriodicTask::ClientState, Response::ClientState(v)) => PollData::ClientState(v),
        (PeriodicTask::DiskUsage, Response::DiskUsage(v)) => PollData::DiskUsage(v),
        (PeriodicTask::FileTransfers, Response::FileTransfers(v)) => PollData::FileTransfers(v),
        (PeriodicTask::Messages, Response::Messages(v)) => PollData::Messages(v),
        (PeriodicTask::Notices, Response::Notices(v)) => PollData::Notices(v),
        (PeriodicTask::ProjectStatus, Response::Projects(v)) => PollData::Projects(v),
        (PeriodicTask::Statistics, Response::Statistics(v)) => PollData::Statistics(v),
        (PeriodicTask::Tasks, Response::Tasks(v)) => PollData::Tasks(v),
        (_, response) => return Err(unexpected_response(&response)),
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiskUsage;

    #[test]
    fn poll_data_rejects_mismatched_response() {
        let err = poll_data(
            PeriodicTask::Messages,
            Response::DiskUsage(DiskUsage::default()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Rpc {
                kind: RpcErrorKind::Parse,
                ..
            }
        ));
    }

    #[test]
    fn poll_data_accepts_matching_response() {
        let data = poll_data(
            PeriodicTask::DiskUsage,
            Response::DiskUsage(DiskUsage::default()),
        )
        .unwrap();
        assert_eq!(data.task(), PeriodicTask::DiskUsage);
    }
}
