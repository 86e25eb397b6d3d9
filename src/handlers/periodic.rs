//! # Periodic poll observer trait.

use async_trait::async_trait;

use crate::types::PollData;

/// Observer for the results of periodic state-refresh polls.
///
/// Invoked from the worker task that produced the data; implementations must
/// be thread-safe. Use [`PollData::task`] to dispatch on the poll kind. The
/// non-reentrancy rules of [`HostHandler`](crate::HostHandler) apply here
/// too.
#[async_trait]
pub trait PeriodicTaskHandler: Send + Sync + 'static {
    /// One periodic poll of `host` completed successfully.
    async fn on_poll(&self, host: &str, data: &PollData);
}
