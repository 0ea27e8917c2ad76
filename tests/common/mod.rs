//! Shared test fixtures: a scripted transport and helpers.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use pubnub_socket::protocol::{PublishRequest, PublishResponse, SubscribeRequest};
use pubnub_socket::transport::ByteStream;
use pubnub_socket::{Error, Result, RetryPolicy, SessionRegistry, Transport};

// ============================================================================
// Logging
// ============================================================================

/// Installs a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Scripts
// ============================================================================

/// What happens after a scripted body's chunks are served.
#[derive(Debug, Clone, Copy)]
pub enum Tail {
    /// Body ends cleanly.
    End,
    /// Body read fails.
    Fail,
    /// Body stays open.
    Pending,
}

/// Response to one `open_stream` call.
pub enum StreamScript {
    /// Serve these chunks, then `tail`.
    Chunks(Vec<Vec<u8>>, Tail),
    /// Answer with an HTTP status.
    Reject(u16),
    /// Fail before any response.
    Refuse,
    /// Serve chunks pushed by the test.
    Live(mpsc::UnboundedReceiver<Result<Bytes>>),
}

impl StreamScript {
    /// One chunk holding all `records`, newline-terminated, then `tail`.
    pub fn records(records: &[&str], tail: Tail) -> Self {
        let mut body = String::new();
        for record in records {
            body.push_str(record);
            body.push('\n');
        }
        Self::Chunks(vec![body.into_bytes()], tail)
    }

    /// A body the test feeds through the returned sender.
    pub fn live() -> (Self, mpsc::UnboundedSender<Result<Bytes>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::Live(rx), tx)
    }
}

// ============================================================================
// MockTransport
// ============================================================================

/// Counts a stream as open until dropped.
struct OpenGuard {
    open: Arc<AtomicUsize>,
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted [`Transport`] that records every request.
///
/// Once the script runs out, streams stay open and idle.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<VecDeque<StreamScript>>,
    subscribes: Mutex<Vec<SubscribeRequest>>,
    publishes: Mutex<Vec<PublishRequest>>,
    open: Arc<AtomicUsize>,
    max_open: AtomicUsize,
    fail_publish: std::sync::atomic::AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_scripts(scripts: impl IntoIterator<Item = StreamScript>) -> Arc<Self> {
        let transport = Self::default();
        transport.scripts.lock().extend(scripts);
        Arc::new(transport)
    }

    pub fn push(&self, script: StreamScript) {
        self.scripts.lock().push_back(script);
    }

    pub fn fail_publishes(&self) {
        self.fail_publish.store(true, Ordering::SeqCst);
    }

    pub fn subscribe_requests(&self) -> Vec<SubscribeRequest> {
        self.subscribes.lock().clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.lock().len()
    }

    pub fn publish_requests(&self) -> Vec<PublishRequest> {
        self.publishes.lock().clone()
    }

    pub fn open_streams(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_open_streams(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    fn track(&self, body: impl futures_util::Stream<Item = Result<Bytes>> + Send + 'static) -> ByteStream {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);

        let guard = OpenGuard {
            open: Arc::clone(&self.open),
        };
        Box::pin(body.map(move |item| {
            let _open = &guard;
            item
        }))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open_stream(&self, request: &SubscribeRequest) -> Result<ByteStream> {
        self.subscribes.lock().push(request.clone());

        let script = self.scripts.lock().pop_front();
        match script {
            None => Ok(self.track(stream::pending::<Result<Bytes>>())),
            Some(StreamScript::Reject(status)) => Err(Error::service(status, "rejected")),
            Some(StreamScript::Refuse) => Err(Error::connection("connection refused")),
            Some(StreamScript::Chunks(chunks, tail)) => {
                let head = stream::iter(
                    chunks
                        .into_iter()
                        .map(|chunk| Ok::<_, Error>(Bytes::from(chunk))),
                );
                let body: ByteStream = match tail {
                    Tail::End => Box::pin(head),
                    Tail::Fail => Box::pin(head.chain(stream::once(async {
                        Err(Error::connection("connection reset"))
                    }))),
                    Tail::Pending => Box::pin(head.chain(stream::pending::<Result<Bytes>>())),
                };
                Ok(self.track(body))
            }
            Some(StreamScript::Live(rx)) => {
                let body = stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok(self.track(body))
            }
        }
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse> {
        let count = {
            let mut publishes = self.publishes.lock();
            publishes.push(request.clone());
            publishes.len()
        };

        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Error::connection("publish refused"));
        }

        Ok(PublishResponse::from_http(
            200,
            format!("[1,\"Sent\",\"{}\"]", 17_000_000 + count),
        ))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Fast retries for tests.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new()
        .with_failure_delay(Duration::from_millis(20))
        .with_end_of_stream_delay(Duration::from_millis(1))
}

/// Registry over `transport` with [`fast_retry`].
pub fn registry(transport: Arc<MockTransport>) -> Arc<SessionRegistry> {
    SessionRegistry::builder()
        .transport(transport)
        .retry_policy(fast_retry())
        .build()
        .expect("registry")
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
