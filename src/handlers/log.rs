//! # Simple tracing-backed observer for debugging and demos.
//!
//! [`LogHandler`] logs host lifecycle events and poll completions through
//! `tracing`. Enabled via the `logging` feature; primarily useful during
//! development and in examples.
//!
//! Not intended for production use; implement your own
//! [`HostHandler`]/[`PeriodicTaskHandler`] for structured integration.

use async_trait::async_trait;

use crate::error::ControlError;
use crate::handlers::{HostHandler, PeriodicTaskHandler};
use crate::types::PollData;

/// Logs every event it observes at info/warn level.
pub struct LogHandler;

#[async_trait]
impl HostHandler for LogHandler {
    async fn on_host_added(&self, host: &str) {
        tracing::info!(host, "host added");
    }

    async fn on_host_connected(&self, host: &str) {
        tracing::info!(host, "host connected");
    }

    async fn on_host_authorized(&self, host: &str) {
        tracing::info!(host, "host authorized");
    }

    async fn on_host_authorization_failed(&self, host: &str) {
        tracing::warn!(host, "host authorization failed");
    }

    async fn on_host_error(&self, host: &str, error: &ControlError) {
        tracing::warn!(host, error = %error, "host error");
    }

    async fn on_host_removed(&self, host: &str) {
        tracing::info!(host, "host removed");
    }
}

#[async_trait]
impl PeriodicTaskHandler for LogHandler {
    async fn on_poll(&self, host: &str, data: &PollData) {
        tracing::info!(host, task = data.task().as_label(), "poll completed");
    }
}
