//! # Controller: public facade over hosts, scheduler, and observers.
//!
//! The [`Controller`] owns the host map and orchestrates the other
//! components: per-host workers, the periodic-tasks scheduler, the
//! configuration, and the handler registry.
//!
//! ## Architecture
//! ```text
//! user call ──► validate args (before any lock)
//!      │
//!      ├──► lifecycle (add/authorize/remove/shutdown)
//!      │        └──► controller lock → host map + scheduler + configuration
//!      │
//!      ├──► command op ──► CommandJob + Promise ──► host worker queue
//!      │        └──► state-mutating ops nudge the matching periodic task
//!      │
//!      └──► configuration mirror ──► interval table / per-host flags
//! ```
//!
//! ## Rules
//! - Argument validation runs before the lock; empty strings are rejected
//!   with `InvalidArgument` synchronously.
//! - The controller lock is never held across connection I/O; the initial
//!   `connect` runs on a detached task feeding the worker queue.
//! - Lock order is controller → scheduler → configuration → registry;
//!   nothing acquires a higher-ranked lock while holding a lower-ranked one.
//! - Handlers run on controller or worker tasks. A handler that needs to
//!   remove its own host must use [`Controller::async_remove_host`];
//!   a synchronous removal from inside a callback would self-deadlock.
//! - After [`Controller::shutdown`] returns, no worker and no scheduler task
//!   remains and every outstanding promise has been completed. One exception
//!   is documented on [`Controller::add_host`]: a connect attempt that
//!   finishes concurrently with removal/shutdown may still deliver its
//!   `on_host_connected`/`on_host_error` broadcast afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::config::Configuration;
use crate::error::ControlError;
use crate::handlers::{HandlerRegistry, HostHandler, PeriodicTaskHandler};
use crate::host::{job::unexpected_response, HostWorker, Job};
use crate::promise::Promise;
use crate::rpc::{Connector, Request, Response};
use crate::scheduler::Scheduler;
use crate::types::{
    FileTransferOp, GlobalPreferences, GlobalPreferencesMask, GlobalPrefsMode, PeriodicTask,
    ProjectOp, RunMode, TaskOp,
};

struct ControllerState {
    shutdown: bool,
    hosts: HashMap<String, HostWorker>,
}

/// Facade managing remote compute daemons.
///
/// Create it with [`Controller::new`] (inside a tokio runtime; the periodic
/// scheduler starts immediately), register handlers, add hosts, and call
/// [`Controller::shutdown`] when done. Dropping the controller without
/// `shutdown` detaches the background tasks instead of joining them.
pub struct Controller {
    state: Mutex<ControllerState>,
    registry: Arc<HandlerRegistry>,
    config: Arc<Configuration>,
    scheduler: Scheduler,
    connector: Arc<dyn Connector>,
}

fn check_not_empty(value: &str, what: &str) -> Result<(), ControlError> {
    if value.is_empty() {
        Err(ControlError::invalid_argument(format!("missing {what}")))
    } else {
        Ok(())
    }
}

/// Extracts the success flag of a state-mutating operation.
fn ack(response: Response) -> Result<bool, ControlError> {
    match response {
        Response::Ack { success } => Ok(success),
        other => Err(unexpected_response(&other)),
    }
}

impl Controller {
    /// Creates the controller and starts the periodic scheduler.
    ///
    /// `connector` supplies one [`HostConnection`](crate::HostConnection)
    /// per registered host.
    pub fn new(connector: impl Connector) -> Arc<Self> {
        let config = Arc::new(Configuration::new());
        let scheduler = Scheduler::spawn(Arc::clone(&config));

        Arc::new(Self {
            state: Mutex::new(ControllerState {
                shutdown: false,
                hosts: HashMap::new(),
            }),
            registry: Arc::new(HandlerRegistry::new()),
            config,
            scheduler,
            connector: Arc::new(connector),
        })
    }

    // ---- handler registration ----

    /// Registers a lifecycle observer; registering the same `Arc` twice is a
    /// no-op.
    pub fn register_host_handler(&self, handler: Arc<dyn HostHandler>) {
        self.registry.register_host_handler(handler);
    }

    /// Deregisters a lifecycle observer; unknown observers are a no-op.
    pub fn deregister_host_handler(&self, handler: &Arc<dyn HostHandler>) {
        self.registry.deregister_host_handler(handler);
    }

    /// Registers a periodic-poll observer.
    pub fn register_periodic_task_handler(&self, handler: Arc<dyn PeriodicTaskHandler>) {
        self.registry.register_periodic_handler(handler);
    }

    /// Deregisters a periodic-poll observer; unknown observers are a no-op.
    pub fn deregister_periodic_task_handler(&self, handler: &Arc<dyn PeriodicTaskHandler>) {
        self.registry.deregister_periodic_handler(handler);
    }

    // ---- host lifecycle ----

    /// Registers a host and starts connecting to it.
    ///
    /// Returns once the host is registered; the connection attempt continues
    /// on a background task and broadcasts `on_host_connected` or
    /// `on_host_error` when it resolves. `connect` can block for the kernel
    /// connect timeout, so it must not run under the controller lock.
    ///
    /// If the host is removed before the attempt finishes, neither broadcast
    /// fires; if the attempt finishes first, its broadcast may still arrive
    /// after `on_host_removed`.
    pub async fn add_host(&self, host: &str, url: &str, port: u16) -> Result<(), ControlError> {
        check_not_empty(host, "host name")?;
        check_not_empty(url, "url to host")?;

        let queue = {
            let mut state = self.state.lock().await;
            self.verify_not_shutdown(&state)?;
            if state.hosts.contains_key(host) {
                return Err(ControlError::AlreadyRegistered {
                    host: host.to_string(),
                });
            }

            let connection = self.connector.make_connection(host);
            let worker = HostWorker::spawn(
                host.to_string(),
                connection,
                Arc::clone(&self.registry),
                self.scheduler.context(),
            );
            let queue = worker.queue();

            self.config.add_host(host);
            // periodic polls stay off until scheduling is enabled
            self.scheduler.add_host(host, worker.queue());
            state.hosts.insert(host.to_string(), worker);

            self.registry.host_added(host).await;
            queue
        };

        let registry = Arc::clone(&self.registry);
        let host = host.to_string();
        let url = url.to_string();
        tokio::spawn(async move {
            let (done, connected) = oneshot::channel();
            if queue.send(Job::Connect { url, port, done }).is_err() {
                return;
            }
            match connected.await {
                Ok(true) => registry.host_connected(&host).await,
                Ok(false) => {
                    registry
                        .host_error(&host, &ControlError::ConnectionFailed { host: host.clone() })
                        .await;
                }
                // host removed before the attempt finished
                Err(_) => {}
            }
        });

        Ok(())
    }

    /// Submits the authorization sequence for a host. The outcome arrives
    /// via `on_host_authorized` / `on_host_authorization_failed`.
    pub async fn authorize_host(&self, host: &str, password: &str) -> Result<(), ControlError> {
        check_not_empty(host, "host name")?;
        check_not_empty(password, "password")?;

        let state = self.state.lock().await;
        self.verify_not_shutdown(&state)?;
        let worker = self.known_host(&state, host)?;
        if worker
            .schedule(Job::Authorize {
                password: password.to_string(),
            })
            .is_err()
        {
            return Err(ControlError::Shutdown);
        }
        Ok(())
    }

    /// Removes a host: drains its queue (cancelling undelivered jobs),
    /// drops the connection, and broadcasts `on_host_removed`.
    pub async fn remove_host(&self, host: &str) -> Result<(), ControlError> {
        check_not_empty(host, "host name")?;

        let mut state = self.state.lock().await;
        self.verify_not_shutdown(&state)?;
        if !state.hosts.contains_key(host) {
            return Err(ControlError::unknown_host(host));
        }
        self.remove_host_locked(&mut state, host).await;
        Ok(())
    }

    /// Removal for callers inside handler callbacks: the work runs on a
    /// background task that takes the controller lock itself. A host that is
    /// already gone (or a controller already shutting down) counts as
    /// success.
    pub fn async_remove_host(self: &Arc<Self>, host: &str) -> Result<(), ControlError> {
        check_not_empty(host, "host name")?;

        let controller = Arc::clone(self);
        let host = host.to_string();
        tokio::spawn(async move {
            let mut state = controller.state.lock().await;
            if state.shutdown || !state.hosts.contains_key(&host) {
                return;
            }
            controller.remove_host_locked(&mut state, &host).await;
        });
        Ok(())
    }

    /// Returns whether a host with this name is currently registered.
    pub async fn has_host(&self, host: &str) -> bool {
        self.state.lock().await.hosts.contains_key(host)
    }

    /// Stops everything: the scheduler, then every host worker. All
    /// undelivered jobs complete with a cancelled outcome, so no promise is
    /// dropped. Idempotent; the second call returns immediately.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if state.shutdown {
            return;
        }
        state.shutdown = true;

        self.scheduler.shutdown().await;

        let hosts: Vec<String> = state.hosts.keys().cloned().collect();
        for host in hosts {
            self.remove_host_locked(&mut state, &host).await;
        }
    }

    // ---- periodic task configuration ----

    /// Sets the polling interval of one periodic task, for all hosts.
    pub fn set_periodic_task_interval(
        &self,
        task: PeriodicTask,
        seconds: u32,
    ) -> Result<(), ControlError> {
        if seconds == 0 {
            return Err(ControlError::invalid_argument(
                "interval must be positive",
            ));
        }
        self.config.set_interval(task, seconds);
        Ok(())
    }

    /// Current polling interval of one periodic task, in seconds.
    pub fn periodic_task_interval(&self, task: PeriodicTask) -> u32 {
        self.config.interval(task)
    }

    /// Enables or disables periodic polling for a host.
    pub async fn schedule_periodic_tasks(
        &self,
        host: &str,
        value: bool,
    ) -> Result<(), ControlError> {
        check_not_empty(host, "host name")?;

        let state = self.state.lock().await;
        self.verify_not_shutdown(&state)?;
        self.known_host(&state, host)?;
        self.config.set_schedule_enabled(host, value);
        Ok(())
    }

    /// Restricts task polls of a host to active workunits, and refreshes the
    /// task list promptly.
    pub async fn active_only_tasks(&self, host: &str, value: bool) -> Result<(), ControlError> {
        check_not_empty(host, "host name")?;

        let state = self.state.lock().await;
        self.verify_not_shutdown(&state)?;
        self.known_host(&state, host)?;
        self.config.set_active_only_tasks(host, value);
        self.scheduler.reschedule_now(host, PeriodicTask::Tasks);
        Ok(())
    }

    /// Forces a periodic task's next execution to the current scheduler
    /// tick. A nudge for a poll that is already queued or in flight is
    /// absorbed.
    pub async fn reschedule_now(&self, host: &str, task: PeriodicTask) -> Result<(), ControlError> {
        check_not_empty(host, "host name")?;

        let state = self.state.lock().await;
        self.verify_not_shutdown(&state)?;
        self.known_host(&state, host)?;
        self.scheduler.reschedule_now(host, task);
        Ok(())
    }

    // ---- command operations ----

    /// Aborts or retries a file transfer; refreshes the transfer list
    /// promptly.
    pub async fn file_transfer_op(
        &self,
        host: &str,
        op: FileTransferOp,
        master_url: &str,
        filename: &str,
    ) -> Result<Promise<bool>, ControlError> {
        check_not_empty(host, "host name")?;
        check_not_empty(master_url, "master url")?;
        check_not_empty(filename, "filename")?;

        Ok(self
            .submit(
                host,
                Request::FileTransferOp {
                    op,
                    master_url: master_url.to_string(),
                    filename: filename.to_string(),
                },
                ack,
                Some(PeriodicTask::FileTransfers),
            )
            .await)
    }

    /// Runs an operation on an attached project; refreshes the project list
    /// promptly.
    pub async fn project_op(
        &self,
        host: &str,
        op: ProjectOp,
        master_url: &str,
    ) -> Result<Promise<bool>, ControlError> {
        check_not_empty(host, "host name")?;
        check_not_empty(master_url, "master url")?;

        Ok(self
            .submit(
                host,
                Request::ProjectOp {
                    op,
                    master_url: master_url.to_string(),
                },
                ack,
                Some(PeriodicTask::ProjectStatus),
            )
            .await)
    }

    /// Runs an operation on a workunit; refreshes the task list promptly.
    pub async fn task_op(
        &self,
        host: &str,
        op: TaskOp,
        master_url: &str,
        task_name: &str,
    ) -> Result<Promise<bool>, ControlError> {
        check_not_empty(host, "host name")?;
        check_not_empty(master_url, "master url")?;
        check_not_empty(task_name, "task name")?;

        Ok(self
            .submit(
                host,
                Request::TaskOp {
                    op,
                    master_url: master_url.to_string(),
                    task_name: task_name.to_string(),
                },
                ack,
                Some(PeriodicTask::Tasks),
            )
            .await)
    }

    /// Loads the global preferences of a host.
    pub async fn load_global_preferences(
        &self,
        host: &str,
        mode: GlobalPrefsMode,
    ) -> Result<Promise<GlobalPreferences>, ControlError> {
        check_not_empty(host, "host name")?;

        Ok(self
            .submit(
                host,
                Request::GetGlobalPreferences { mode },
                |response| match response {
                    Response::GlobalPreferences(preferences) => Ok(preferences),
                    other => Err(unexpected_response(&other)),
                },
                None,
            )
            .await)
    }

    /// Writes the masked subset of `preferences` as the host's override.
    pub async fn save_global_preferences(
        &self,
        host: &str,
        preferences: GlobalPreferences,
        mask: GlobalPreferencesMask,
    ) -> Result<Promise<bool>, ControlError> {
        check_not_empty(host, "host name")?;

        Ok(self
            .submit(
                host,
                Request::SetGlobalPreferences { preferences, mask },
                ack,
                None,
            )
            .await)
    }

    /// Tells the daemon to re-read its preferences override file.
    pub async fn read_global_prefs_override(
        &self,
        host: &str,
    ) -> Result<Promise<bool>, ControlError> {
        check_not_empty(host, "host name")?;

        Ok(self
            .submit(host, Request::ReadGlobalPrefsOverride, ack, None)
            .await)
    }

    /// Sets the cpu run mode.
    pub async fn run_mode(
        &self,
        host: &str,
        mode: RunMode,
    ) -> Result<Promise<bool>, ControlError> {
        check_not_empty(host, "host name")?;
        Ok(self
            .submit(host, Request::SetRunMode { mode }, ack, None)
            .await)
    }

    /// Sets the gpu run mode.
    pub async fn gpu_mode(
        &self,
        host: &str,
        mode: RunMode,
    ) -> Result<Promise<bool>, ControlError> {
        check_not_empty(host, "host name")?;
        Ok(self
            .submit(host, Request::SetGpuMode { mode }, ack, None)
            .await)
    }

    /// Sets the network mode.
    pub async fn network_mode(
        &self,
        host: &str,
        mode: RunMode,
    ) -> Result<Promise<bool>, ControlError> {
        check_not_empty(host, "host name")?;
        Ok(self
            .submit(host, Request::SetNetworkMode { mode }, ack, None)
            .await)
    }

    // ---- internals; the controller lock is held where noted ----

    /// Builds a command job, enqueues it, and optionally nudges the matching
    /// periodic task. Precondition failures complete the promise instead of
    /// leaking it.
    async fn submit<T, F>(
        &self,
        host: &str,
        request: Request,
        map: F,
        nudge: Option<PeriodicTask>,
    ) -> Promise<T>
    where
        T: Send + 'static,
        F: FnOnce(Response) -> Result<T, ControlError> + Send + 'static,
    {
        let (job, pending) = Job::command(request, map);

        let state = self.state.lock().await;
        if state.shutdown {
            job.fail(ControlError::Shutdown);
            return pending;
        }
        let Some(worker) = state.hosts.get(host) else {
            tracing::debug!(host = %host, "command submitted for unknown host");
            job.fail(ControlError::unknown_host(host));
            return pending;
        };
        if let Err(job) = worker.schedule(job) {
            job.fail(ControlError::Shutdown);
            return pending;
        }
        if let Some(task) = nudge {
            self.scheduler.reschedule_now(host, task);
        }
        pending
    }

    /// Runs the removal sequence; caller holds the controller lock. The
    /// scheduler forgets the host before the worker stops, so no in-flight
    /// post-execution callback can observe a half-removed host.
    async fn remove_host_locked(&self, state: &mut ControllerState, host: &str) {
        self.scheduler.remove_host(host);
        if let Some(worker) = state.hosts.remove(host) {
            worker.shutdown().await;
        }
        self.registry.host_removed(host).await;
        self.config.remove_host(host);
    }

    fn verify_not_shutdown(&self, state: &ControllerState) -> Result<(), ControlError> {
        if state.shutdown {
            Err(ControlError::Shutdown)
        } else {
            Ok(())
        }
    }

    fn known_host<'a>(
        &self,
        state: &'a ControllerState,
        host: &str,
    ) -> Result<&'a HostWorker, ControlError> {
        state.hosts.get(host).ok_or_else(|| {
            tracing::debug!(host = %host, "operation on unknown host");
            ControlError::unknown_host(host)
        })
    }
}
