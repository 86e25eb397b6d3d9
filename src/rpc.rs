//! # RPC substrate consumed by the controller.
//!
//! The controller never touches sockets or the wire encoding itself; it
//! drives a [`HostConnection`] capability that a lower layer (or a test mock)
//! provides via a [`Connector`] factory.
//!
//! - [`Request`] / [`Response`]: opaque tagged values, one variant per
//!   command and per periodic poll.
//! - [`HostConnection`]: long-lived connection to one daemon; owned by that
//!   host's worker and driven strictly serially.
//! - [`Connector`]: creates a fresh, unconnected [`HostConnection`] when a
//!   host is registered.
//!
//! ## Rules
//! - `execute` is never called before `connect` succeeded.
//! - At most one call is in flight per connection (the worker is serial).
//! - A failed exchange returns [`RpcError`]; the connection stays owned by
//!   the worker and may be driven again (retries resume at the next poll).

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{ControlError, RpcErrorKind};
use crate::types::{
    CcStatus, ClientState, DiskUsage, FileTransfer, FileTransferOp, GlobalPreferences,
    GlobalPreferencesMask, GlobalPrefsMode, Messages, Notices, Project, ProjectOp, RunMode,
    Statistics, TaskInfo, TaskOp,
};

/// A request to a remote compute daemon.
#[derive(Debug, Clone)]
pub enum Request {
    CcStatus,
    ClientState,
    DiskUsage,
    FileTransfers,
    /// Fetch messages newer than `seqno`.
    Messages { seqno: u64 },
    /// Fetch notices newer than `seqno`.
    Notices { seqno: u64 },
    ProjectStatus,
    Statistics,
    Tasks {
        active_only: bool,
    },
    FileTransferOp {
        op: FileTransferOp,
        master_url: String,
        filename: String,
    },
    ProjectOp {
        op: ProjectOp,
        master_url: String,
    },
    TaskOp {
        op: TaskOp,
        master_url: String,
        task_name: String,
    },
    GetGlobalPreferences {
        mode: GlobalPrefsMode,
    },
    SetGlobalPreferences {
        preferences: GlobalPreferences,
        mask: GlobalPreferencesMask,
    },
    ReadGlobalPrefsOverride,
    SetRunMode {
        mode: RunMode,
    },
    SetGpuMode {
        mode: RunMode,
    },
    SetNetworkMode {
        mode: RunMode,
    },
}

/// A reply from a remote compute daemon.
#[derive(Debug, Clone)]
pub enum Response {
    CcStatus(CcStatus),
    ClientState(ClientState),
    DiskUsage(DiskUsage),
    FileTransfers(Vec<FileTransfer>),
    Messages(Messages),
    Notices(Notices),
    Projects(Vec<Project>),
    Statistics(Statistics),
    Tasks(Vec<TaskInfo>),
    GlobalPreferences(GlobalPreferences),
    /// Outcome of a state-mutating operation.
    Ack { success: bool },
}

/// A failed RPC exchange.
#[derive(Error, Debug, Clone)]
#[error("{}: {message}", .kind.as_label())]
pub struct RpcError {
    /// Classification of the failure.
    pub kind: RpcErrorKind,
    /// Detail from the connection layer.
    pub message: String,
}

impl RpcError {
    /// Convenience constructor.
    pub fn new(kind: RpcErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<RpcError> for ControlError {
    fn from(e: RpcError) -> Self {
        ControlError::Rpc {
            kind: e.kind,
            message: e.message,
        }
    }
}

/// Long-lived connection to one compute daemon.
///
/// Implementations live below this crate (wire encoding and socket I/O are
/// out of scope here). The worker that owns the connection guarantees serial
/// access, so implementations need no internal locking.
#[async_trait]
pub trait HostConnection: Send + 'static {
    /// Establishes the connection. May block for seconds (kernel connect
    /// timeout); the controller never calls this while holding a lock.
    ///
    /// Called exactly once per connection, before any other method.
    async fn connect(&mut self, url: &str, port: u16) -> bool;

    /// Runs the authorization sequence. `Ok(true)` means authorized,
    /// `Ok(false)` means the daemon rejected the credentials.
    async fn authorize(&mut self, password: &str) -> Result<bool, RpcError>;

    /// Executes one request/response exchange.
    async fn execute(&mut self, request: Request) -> Result<Response, RpcError>;
}

/// Factory for [`HostConnection`]s, consumed by the controller when a host is
/// registered.
pub trait Connector: Send + Sync + 'static {
    /// Creates a fresh, unconnected connection for the named host.
    fn make_connection(&self, host: &str) -> Box<dyn HostConnection>;
}
