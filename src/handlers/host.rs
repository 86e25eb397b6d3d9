//! # Host lifecycle observer trait.
//!
//! `HostHandler` is the extension point for reacting to host lifecycle
//! transitions: registration, connection, authorization, errors, removal.
//!
//! ## Contract
//! - Callbacks run on whichever worker or controller task produced the
//!   event; implementations must be thread-safe and should return quickly.
//! - Callbacks must **not** call back into handler (de)registration; the
//!   registry is not reentrant. Removing the observed host from inside a
//!   callback requires
//!   [`Controller::async_remove_host`](crate::Controller::async_remove_host).
//! - All methods default to no-ops; implement the ones you care about.

use async_trait::async_trait;

use crate::error::ControlError;

/// Observer for host lifecycle events.
#[async_trait]
pub trait HostHandler: Send + Sync + 'static {
    /// The host was registered with the controller.
    async fn on_host_added(&self, host: &str) {
        let _ = host;
    }

    /// The initial connection attempt succeeded.
    async fn on_host_connected(&self, host: &str) {
        let _ = host;
    }

    /// The daemon accepted the authorization sequence.
    async fn on_host_authorized(&self, host: &str) {
        let _ = host;
    }

    /// The daemon rejected the authorization sequence.
    async fn on_host_authorization_failed(&self, host: &str) {
        let _ = host;
    }

    /// Connecting failed, or a periodic poll completed with an error.
    async fn on_host_error(&self, host: &str, error: &ControlError) {
        let _ = (host, error);
    }

    /// The host was removed; no further callbacks follow for it (but see
    /// [`Controller::add_host`](crate::Controller::add_host) for the one
    /// documented race with a still-running connect attempt).
    async fn on_host_removed(&self, host: &str) {
        let _ = host;
    }
}
