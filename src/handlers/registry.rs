//! # HandlerRegistry: fan-out over registered observers.
//!
//! Keeps the two disjoint observer sets ([`HostHandler`],
//! [`PeriodicTaskHandler`]) and provides one broadcast method per event.
//!
//! ## What it guarantees
//! - Set semantics: registering the same observer (same `Arc`) twice is a
//!   no-op, deregistering an unknown observer is a no-op.
//! - Broadcasts snapshot the set under a read lock and invoke observers
//!   outside it, so concurrent broadcasts from different workers do not
//!   serialize on each other.
//! - Panics inside observers are caught and logged (isolation); a panicking
//!   observer never tears down the worker that called it.
//!
//! ## What it does **not** guarantee
//! - No global ordering across observers.
//! - No reentrancy: observers must not (de)register handlers from inside a
//!   callback.

use std::sync::{Arc, RwLock};

use futures::FutureExt;

use crate::error::ControlError;
use crate::handlers::{HostHandler, PeriodicTaskHandler};
use crate::types::PollData;

/// Observer sets plus broadcast helpers.
pub(crate) struct HandlerRegistry {
    host_handlers: RwLock<Vec<Arc<dyn HostHandler>>>,
    periodic_handlers: RwLock<Vec<Arc<dyn PeriodicTaskHandler>>>,
}

fn insert_unique<T: ?Sized>(set: &RwLock<Vec<Arc<T>>>, handler: Arc<T>) {
    let mut handlers = set.write().unwrap();
    if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
        handlers.push(handler);
    }
}

fn remove_known<T: ?Sized>(set: &RwLock<Vec<Arc<T>>>, handler: &Arc<T>) {
    set.write().unwrap().retain(|h| !Arc::ptr_eq(h, handler));
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            host_handlers: RwLock::new(Vec::new()),
            periodic_handlers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn register_host_handler(&self, handler: Arc<dyn HostHandler>) {
        insert_unique(&self.host_handlers, handler);
    }

    pub(crate) fn deregister_host_handler(&self, handler: &Arc<dyn HostHandler>) {
        remove_known(&self.host_handlers, handler);
    }

    pub(crate) fn register_periodic_handler(&self, handler: Arc<dyn PeriodicTaskHandler>) {
        insert_unique(&self.periodic_handlers, handler);
    }

    pub(crate) fn deregister_periodic_handler(&self, handler: &Arc<dyn PeriodicTaskHandler>) {
        remove_known(&self.periodic_handlers, handler);
    }

    fn host_snapshot(&self) -> Vec<Arc<dyn HostHandler>> {
        self.host_handlers.read().unwrap().clone()
    }

    fn periodic_snapshot(&self) -> Vec<Arc<dyn PeriodicTaskHandler>> {
        self.periodic_handlers.read().unwrap().clone()
    }

    pub(crate) async fn host_added(&self, host: &str) {
        for handler in self.host_snapshot() {
            guarded(handler.on_host_added(host)).await;
        }
    }

    pub(crate) async fn host_connected(&self, host: &str) {
        for handler in self.host_snapshot() {
            guarded(handler.on_host_connected(host)).await;
        }
    }

    pub(crate) async fn host_authorized(&self, host: &str) {
        for handler in self.host_snapshot() {
            guarded(handler.on_host_authorized(host)).await;
        }
    }

    pub(crate) async fn host_authorization_failed(&self, host: &str) {
        for handler in self.host_snapshot() {
            guarded(handler.on_host_authorization_failed(host)).await;
        }
    }

    pub(crate) async fn host_error(&self, host: &str, error: &ControlError) {
        for handler in self.host_snapshot() {
            guarded(handler.on_host_error(host, error)).await;
        }
    }

    pub(crate) async fn host_removed(&self, host: &str) {
        for handler in self.host_snapshot() {
            guarded(handler.on_host_removed(host)).await;
        }
    }

    pub(crate) async fn poll_completed(&self, host: &str, data: &PollData) {
        for handler in self.periodic_snapshot() {
            guarded(handler.on_poll(host, data)).await;
        }
    }
}

/// Runs one observer callback, catching panics so they stay inside the
/// observer instead of killing the worker.
async fn guarded(fut: impl std::future::Future<Output = ()>) {
    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        tracing::warn!(?panic, "observer panicked during broadcast");
    }
}
