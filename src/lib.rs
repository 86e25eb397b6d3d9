//! # hostvisor
//!
//! **Hostvisor** is a controller library for remote compute daemons.
//!
//! It manages any number of named hosts over a request/response RPC
//! connection, drives periodic state-refresh polling for each of them, and
//! fans lifecycle and poll results out to registered observers. The crate is
//! designed as the coordination core under GUIs and other frontends; the
//! wire-level client plugs in from below.
//!
//! ## Features
//!
//! | Area               | Description                                                        | Key types / traits                        |
//! |--------------------|--------------------------------------------------------------------|-------------------------------------------|
//! | **Host lifecycle** | Add, connect, authorize, and remove daemon endpoints.              | [`Controller`]                            |
//! | **Commands**       | Submit operations returning write-once futures.                    | [`Promise`], [`RunMode`], [`TaskOp`], ... |
//! | **Polling**        | Nine periodic state polls with per-kind intervals and nudges.      | [`PeriodicTask`], [`PollData`]            |
//! | **Observers**      | Hook into host lifecycle events and poll results.                  | [`HostHandler`], [`PeriodicTaskHandler`]  |
//! | **RPC substrate**  | Capability traits the wire layer (or a test mock) implements.      | [`Connector`], [`HostConnection`]         |
//! | **Errors**         | Typed errors for arguments, lifecycle, and RPC failures.           | [`ControlError`], [`RpcErrorKind`]        |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogHandler`] _(demo/reference only)_.
//!
//! Each host gets a dedicated worker task that owns the connection and
//! executes jobs strictly in arrival order; periodic polls and ad-hoc
//! commands share that queue. A single scheduler task wakes every 200 ms and
//! decides which polls are due. Shutting the controller down stops the
//! scheduler, then drains every worker, completing undelivered jobs with a
//! cancelled outcome so no promise is ever dropped.
//!
//! ```no_run
//! use hostvisor::{Connector, Controller, HostConnection, PeriodicTask, RunMode};
//!
//! struct WireConnector;
//!
//! impl Connector for WireConnector {
//!     fn make_connection(&self, _host: &str) -> Box<dyn HostConnection> {
//!         unimplemented!("the wire-level client lives outside this crate")
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = Controller::new(WireConnector);
//!
//!     controller.add_host("office", "127.0.0.1", 31416).await?;
//!     controller.authorize_host("office", "secret").await?;
//!
//!     // poll the task list every 5 seconds
//!     controller.set_periodic_task_interval(PeriodicTask::Tasks, 5)?;
//!     controller.schedule_periodic_tasks("office", true).await?;
//!
//!     // submit a command and await its promise
//!     let pending = controller.run_mode("office", RunMode::Auto).await?;
//!     let accepted = pending.await?;
//!     assert!(accepted);
//!
//!     controller.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod config;
mod controller;
mod error;
mod handlers;
mod host;
mod promise;
mod rpc;
mod scheduler;
mod types;

// ---- Public re-exports ----

pub use controller::Controller;
pub use error::{ControlError, RpcErrorKind};
pub use handlers::{HostHandler, PeriodicTaskHandler};
pub use promise::Promise;
pub use rpc::{Connector, HostConnection, Request, Response, RpcError};
pub use types::{
    CcStatus, ClientState, DiskUsage, FileTransfer, FileTransferOp, GlobalPreferences,
    GlobalPreferencesMask, GlobalPrefsMode, Message, Messages, Notice, Notices, PeriodicTask,
    PollData, Project, ProjectOp, ProjectStatistics, RunMode, Statistics, TaskInfo, TaskOp,
};

// Optional: expose a simple built-in logging observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use handlers::LogHandler;
