//! # Error types used by the controller and its workers.
//!
//! This module defines the single public error enum:
//!
//! - [`ControlError`] errors surfaced to callers through return values,
//!   promises, and [`HostHandler::on_host_error`](crate::HostHandler::on_host_error).
//!
//! [`RpcErrorKind`] classifies the non-OK outcomes of an RPC exchange; the OK
//! case is the `Ok` arm of the connection result, so it has no variant here.
//!
//! Both types provide `as_label` helpers for logs/metrics.

use thiserror::Error;

/// Classification of a failed RPC exchange with a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    /// The daemon's reply could not be interpreted.
    Parse,
    /// The daemon rejected or failed the request.
    Client,
    /// The connection to the daemon is gone.
    Disconnected,
    /// The job was cancelled before or during execution (worker shutdown).
    Cancelled,
}

impl RpcErrorKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RpcErrorKind::Parse => "rpc_parse_error",
            RpcErrorKind::Client => "rpc_client_error",
            RpcErrorKind::Disconnected => "rpc_disconnected",
            RpcErrorKind::Cancelled => "rpc_cancelled",
        }
    }
}

/// # Errors produced by the controller.
///
/// Argument errors are returned synchronously from the facade entry points;
/// submission and execution errors travel through the returned
/// [`Promise`](crate::Promise) or are broadcast to host handlers.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ControlError {
    /// An entry point was called with an unusable argument (e.g. an empty
    /// host name, url, or password).
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input.
        reason: String,
    },

    /// The controller is shutting down or has already shut down.
    #[error("controller is shut down")]
    Shutdown,

    /// No host with the given name is registered.
    #[error("host '{host}' is not registered")]
    UnknownHost {
        /// The unknown host name.
        host: String,
    },

    /// A host with the given name is already registered.
    #[error("host '{host}' already registered")]
    AlreadyRegistered {
        /// The duplicate host name.
        host: String,
    },

    /// The initial connection attempt to the host failed.
    #[error("could not connect to host '{host}'")]
    ConnectionFailed {
        /// The host that could not be reached.
        host: String,
    },

    /// The daemon rejected the authorization sequence.
    #[error("authorization failed for host '{host}'")]
    AuthorizationFailed {
        /// The host that rejected the credentials.
        host: String,
    },

    /// An RPC exchange completed with a non-OK status.
    #[error("rpc failed ({}): {message}", .kind.as_label())]
    Rpc {
        /// Classification of the failure.
        kind: RpcErrorKind,
        /// Human-readable detail from the connection layer.
        message: String,
    },
}

impl ControlError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ControlError::InvalidArgument { .. } => "invalid_argument",
            ControlError::Shutdown => "shutdown",
            ControlError::UnknownHost { .. } => "unknown_host",
            ControlError::AlreadyRegistered { .. } => "already_registered",
            ControlError::ConnectionFailed { .. } => "connection_failed",
            ControlError::AuthorizationFailed { .. } => "authorization_failed",
            ControlError::Rpc { kind, .. } => kind.as_label(),
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        ControlError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_host(host: impl Into<String>) -> Self {
        ControlError::UnknownHost { host: host.into() }
    }

    pub(crate) fn cancelled() -> Self {
        ControlError::Rpc {
            kind: RpcErrorKind::Cancelled,
            message: "job cancelled during worker shutdown".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(ControlError::Shutdown.as_label(), "shutdown");
        assert_eq!(ControlError::unknown_host("h").as_label(), "unknown_host");
        assert_eq!(ControlError::cancelled().as_label(), "rpc_cancelled");
    }
}
