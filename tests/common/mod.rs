//! Shared test doubles: a scriptable in-memory connection and a recording
//! observer.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hostvisor::{
    CcStatus, ClientState, Connector, ControlError, DiskUsage, GlobalPreferences, HostConnection,
    HostHandler, Messages, Notices, PeriodicTask, PeriodicTaskHandler, PollData, Request,
    Response, RpcError, RpcErrorKind, Statistics,
};

/// Scriptable behavior shared by every connection a [`MockConnector`] makes.
pub struct MockState {
    /// Outcome of `connect`.
    pub connect_ok: AtomicBool,
    /// Outcome of `authorize`.
    pub auth_ok: AtomicBool,
    /// When set, `execute` records the request and then never returns.
    pub block_execute: AtomicBool,
    /// When set, `execute` fails with this kind after recording.
    pub fail_kind: Mutex<Option<RpcErrorKind>>,
    /// Every request that reached `execute`, in order.
    pub requests: Mutex<Vec<Request>>,
    /// Sequence number reported by message polls.
    pub messages_seqno: AtomicU64,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connect_ok: AtomicBool::new(true),
            auth_ok: AtomicBool::new(true),
            block_execute: AtomicBool::new(false),
            fail_kind: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            messages_seqno: AtomicU64::new(0),
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_requests(&self, matching: impl Fn(&Request) -> bool) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| matching(r)).count()
    }
}

pub struct MockConnector(pub Arc<MockState>);

impl Connector for MockConnector {
    fn make_connection(&self, _host: &str) -> Box<dyn HostConnection> {
        Box::new(MockConnection(Arc::clone(&self.0)))
    }
}

struct MockConnection(Arc<MockState>);

#[async_trait]
impl HostConnection for MockConnection {
    async fn connect(&mut self, _url: &str, _port: u16) -> bool {
        self.0.connect_ok.load(Ordering::SeqCst)
    }

    async fn authorize(&mut self, _password: &str) -> Result<bool, RpcError> {
        Ok(self.0.auth_ok.load(Ordering::SeqCst))
    }

    async fn execute(&mut self, request: Request) -> Result<Response, RpcError> {
        self.0.requests.lock().unwrap().push(request.clone());

        if self.0.block_execute.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if let Some(kind) = *self.0.fail_kind.lock().unwrap() {
            return Err(RpcError::new(kind, "scripted failure"));
        }

        Ok(match request {
            Request::CcStatus => Response::CcStatus(CcStatus::default()),
            Request::ClientState => Response::ClientState(ClientState::default()),
            Request::DiskUsage => Response::DiskUsage(DiskUsage::default()),
            Request::FileTransfers => Response::FileTransfers(Vec::new()),
            Request::Messages { .. } => Response::Messages(Messages {
                seqno: self.0.messages_seqno.load(Ordering::SeqCst),
                messages: Vec::new(),
            }),
            Request::Notices { .. } => Response::Notices(Notices::default()),
            Request::ProjectStatus => Response::Projects(Vec::new()),
            Request::Statistics => Response::Statistics(Statistics::default()),
            Request::Tasks { .. } => Response::Tasks(Vec::new()),
            Request::GetGlobalPreferences { .. } => {
                Response::GlobalPreferences(GlobalPreferences {
                    cpu_usage_limit: 75.0,
                    ..GlobalPreferences::default()
                })
            }
            _ => Response::Ack { success: true },
        })
    }
}

/// Observer that remembers every callback it received.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<String>>,
    pub polls: Mutex<Vec<(String, PeriodicTask)>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_event(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    pub fn polls_of(&self, task: PeriodicTask) -> usize {
        self.polls.lock().unwrap().iter().filter(|(_, t)| *t == task).count()
    }
}

#[async_trait]
impl HostHandler for Recorder {
    async fn on_host_added(&self, host: &str) {
        self.push(format!("added:{host}"));
    }

    async fn on_host_connected(&self, host: &str) {
        self.push(format!("connected:{host}"));
    }

    async fn on_host_authorized(&self, host: &str) {
        self.push(format!("authorized:{host}"));
    }

    async fn on_host_authorization_failed(&self, host: &str) {
        self.push(format!("auth_failed:{host}"));
    }

    async fn on_host_error(&self, host: &str, error: &ControlError) {
        self.push(format!("error:{host}:{}", error.as_label()));
    }

    async fn on_host_removed(&self, host: &str) {
        self.push(format!("removed:{host}"));
    }
}

#[async_trait]
impl PeriodicTaskHandler for Recorder {
    async fn on_poll(&self, host: &str, data: &PollData) {
        self.polls
            .lock()
            .unwrap()
            .push((host.to_string(), data.task()));
    }
}

/// Polls `cond` every 20 ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return cond();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
