//! # Write-once result slot for command operations.
//!
//! Every command entry point on [`Controller`](crate::Controller) hands back
//! a [`Promise`]: a future that resolves exactly once, either with the typed
//! result of the RPC exchange or with a [`ControlError`].
//!
//! ## Rules
//! - A promise is never left dangling: worker shutdown completes every
//!   undelivered job with a cancelled outcome before the worker exits.
//! - Dropping a promise is fine; the completion side ignores a gone receiver.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::ControlError;

/// Future for the result of a submitted command.
///
/// Resolves to the typed result on success, or to [`ControlError`] when the
/// submission was rejected (`UnknownHost`, `Shutdown`) or the RPC exchange
/// failed.
#[derive(Debug)]
pub struct Promise<T> {
    rx: oneshot::Receiver<Result<T, ControlError>>,
}

/// Completion side of a [`Promise`]; owned by the job until it finishes.
#[derive(Debug)]
pub(crate) struct Completion<T> {
    tx: oneshot::Sender<Result<T, ControlError>>,
}

/// Creates a connected completion/promise pair.
pub(crate) fn promise<T>() -> (Completion<T>, Promise<T>) {
    let (tx, rx) = oneshot::channel();
    (Completion { tx }, Promise { rx })
}

impl<T> Completion<T> {
    /// Resolves the promise; a dropped receiver is ignored.
    pub(crate) fn complete(self, result: Result<T, ControlError>) {
        let _ = self.tx.send(result);
    }
}

impl<T> Promise<T> {
    /// A promise that is already failed; used when submission preconditions
    /// are not met.
    pub(crate) fn failed(err: ControlError) -> Self {
        let (completion, promise) = promise();
        completion.complete(Err(err));
        promise
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T, ControlError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender only happens if a worker dies without draining,
        // which the shutdown protocol rules out; map it to Shutdown anyway.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(ControlError::Shutdown)))
    }
}
