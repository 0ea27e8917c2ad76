//! Channel session: one subscribe loop for one channel.
//!
//! A session owns the streaming request for its channel, feeds the body
//! through a [`StreamReader`], tracks the resumption cursor, restarts on
//! failure, and fans decoded messages out to its listeners.
//!
//! # State Machine
//!
//! ```text
//! Idle ──start──► Streaming ──failure / end──► RetryWait ──delay──► Streaming
//!                     │                            │
//!                     └────────── stop ────────────┴──────────► Stopped
//! ```
//!
//! # Event Loop
//!
//! The session spawns a tokio task that:
//!
//! - Opens `GET /stream/...` at the current cursor
//! - Delivers each envelope to a snapshot of the listener set
//! - Waits [`RetryPolicy`] delays between attempts, forever
//! - Exits only when cancelled or when the service rejects the request

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConnectionParams, RetryPolicy};
use crate::error::{Error, Result};
use crate::identifiers::{ChannelName, ListenerId};
use crate::protocol::{Envelope, StreamReader, SubscribeRequest, Timetoken, envelope_stream};
use crate::transport::{ByteStream, Transport};

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
///
/// Called on the session task for every event, in order. Must not block.
pub type SessionListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

// ============================================================================
// SessionEvent
// ============================================================================

/// Events a session raises to its listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// First non-`"0"` cursor observed. Raised once per session.
    Connect {
        /// Cursor that established the connection.
        cursor: Timetoken,
    },

    /// One opaque message, in service order.
    Message(Value),

    /// A stream failed after the session had connected. Retrying.
    Disconnect {
        /// Description of the failure.
        reason: String,
    },

    /// Data is flowing again after a [`SessionEvent::Disconnect`].
    Reconnect,

    /// The service rejected the subscription. The session has stopped.
    Error {
        /// Description of the rejection.
        reason: String,
    },
}

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of a [`ChannelSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no request issued yet.
    Idle,
    /// A streaming request is open or being opened.
    Streaming,
    /// Waiting before the next attempt.
    RetryWait,
    /// Terminal.
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::RetryWait => "retry-wait",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Result of [`ChannelSession::add_listener`].
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    /// ID of the new listener.
    pub id: ListenerId,
    /// The session had already raised [`SessionEvent::Connect`].
    ///
    /// Such a listener will never see `Connect` itself.
    pub connected: bool,
}

/// Listener set plus the connect flag, guarded together so a listener
/// either receives `Connect` or learns it already happened, never both.
#[derive(Default)]
struct ListenerSet {
    entries: Vec<(ListenerId, SessionListener)>,
    connected: bool,
}

impl ListenerSet {
    fn snapshot(&self) -> Vec<SessionListener> {
        self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

// ============================================================================
// ChannelSession
// ============================================================================

/// The single subscribe loop for one channel.
///
/// Created by [`SessionRegistry`](super::SessionRegistry); at most one
/// streaming request per session is in flight at any time.
pub struct ChannelSession {
    /// Connection parameters (channel, keys, origin).
    params: ConnectionParams,
    /// Network operations.
    transport: Arc<dyn Transport>,
    /// Restart delays.
    retry: RetryPolicy,
    /// Stream reader buffer cap.
    max_buffer: usize,
    /// Current lifecycle state.
    state: Mutex<SessionState>,
    /// Last cursor from a parsed envelope.
    cursor: Mutex<Timetoken>,
    /// Registered listeners, in registration order.
    listeners: Mutex<ListenerSet>,
    /// Cancels the in-flight request and the retry wait.
    cancel: CancellationToken,
    /// Set once the loop task has been spawned.
    started: AtomicBool,
}

impl fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSession")
            .field("channel", self.params.channel())
            .field("state", &self.state())
            .field("cursor", &self.cursor())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ChannelSession - Constructor
// ============================================================================

impl ChannelSession {
    /// Creates an idle session. Call [`start`](Self::start) to begin streaming.
    pub fn new(
        params: ConnectionParams,
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
        max_buffer: usize,
    ) -> Arc<Self> {
        let cursor = params.timetoken().clone();

        Arc::new(Self {
            params,
            transport,
            retry,
            max_buffer,
            state: Mutex::new(SessionState::Idle),
            cursor: Mutex::new(cursor),
            listeners: Mutex::new(ListenerSet::default()),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }
}

// ============================================================================
// ChannelSession - Accessors
// ============================================================================

impl ChannelSession {
    /// Returns the channel.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &ChannelName {
        self.params.channel()
    }

    /// Returns the connection parameters.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Returns the current resumption cursor.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Timetoken {
        self.cursor.lock().clone()
    }

    /// Returns `true` once `Connect` has been raised.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.listeners.lock().connected
    }

    /// Returns `true` once the session has been stopped.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }
}

// ============================================================================
// ChannelSession - Listeners
// ============================================================================

impl ChannelSession {
    /// Registers a listener.
    ///
    /// Deliveries already in progress are unaffected; the listener sees
    /// events from the next envelope on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionStopped`] if the session has stopped.
    pub fn add_listener(&self, listener: SessionListener) -> Result<Registration> {
        let mut set = self.listeners.lock();

        if self.is_stopped() {
            return Err(Error::session_stopped(self.channel().as_str()));
        }

        let id = ListenerId::next();
        set.entries.push((id, listener));

        debug!(channel = %self.channel(), listener = %id, count = set.entries.len(), "Listener added");

        Ok(Registration {
            id,
            connected: set.connected,
        })
    }

    /// Removes a listener. Returns `true` if it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut set = self.listeners.lock();
        let before = set.entries.len();
        set.entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = set.entries.len() != before;

        if removed {
            debug!(channel = %self.channel(), listener = %id, count = set.entries.len(), "Listener removed");
        }

        removed
    }
}

// ============================================================================
// ChannelSession - Lifecycle
// ============================================================================

impl ChannelSession {
    /// Spawns the subscribe loop on `runtime`. Later calls are no-ops.
    pub fn start(self: &Arc<Self>, runtime: &Handle) {
        if self.is_stopped() || self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let session = Arc::clone(self);
        runtime.spawn(session.run());
    }

    /// Stops the session: cancels the in-flight request and any pending
    /// restart. Terminal and idempotent.
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }

        self.cancel.cancel();
        self.set_state(SessionState::Stopped);
        info!(channel = %self.channel(), cursor = %self.cursor(), "Channel session stopped");
    }

    #[inline]
    fn set_state(&self, state: SessionState) {
        let mut guard = self.state.lock();
        if *guard != SessionState::Stopped {
            *guard = state;
        }
    }
}

// ============================================================================
// ChannelSession - Event Loop
// ============================================================================

impl ChannelSession {
    /// Subscribe loop. Runs until cancelled or rejected.
    async fn run(self: Arc<Self>) {
        info!(channel = %self.channel(), cursor = %self.cursor(), "Channel session started");

        // Set by a post-connect failure, cleared by the next envelope.
        let mut disconnected = false;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.set_state(SessionState::Streaming);

            let request = match SubscribeRequest::new(&self.params, &self.cursor()) {
                Ok(request) => request,
                Err(e) => {
                    self.fail(&e);
                    break;
                }
            };

            let opened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.transport.open_stream(&request) => result,
            };

            let delay = match opened {
                Ok(body) => match self.consume(body, &mut disconnected).await {
                    Some(delay) => delay,
                    None => break,
                },
                Err(e) if matches!(e, Error::Service { .. }) && !e.is_retryable() => {
                    self.fail(&e);
                    break;
                }
                Err(e) => {
                    warn!(channel = %self.channel(), error = %e, "Subscribe request failed");
                    self.note_failure(&e, &mut disconnected);
                    self.retry.failure_delay
                }
            };

            self.set_state(SessionState::RetryWait);
            trace!(channel = %self.channel(), delay_ms = delay.as_millis() as u64, "Waiting before restart");

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(SessionState::Stopped);
        debug!(channel = %self.channel(), "Subscribe loop terminated");
    }

    /// Reads one response body to its end.
    ///
    /// Returns the restart delay, or `None` if cancelled.
    async fn consume(&self, body: ByteStream, disconnected: &mut bool) -> Option<Duration> {
        let envelopes = envelope_stream(body, StreamReader::with_max_buffer(self.max_buffer));
        tokio::pin!(envelopes);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                next = envelopes.next() => next,
            };

            match next {
                Some(Ok(envelope)) => {
                    if self.cancel.is_cancelled() {
                        return None;
                    }
                    self.handle_envelope(envelope, disconnected);
                }
                Some(Err(e)) => {
                    warn!(channel = %self.channel(), error = %e, "Subscribe stream read failed");
                    self.note_failure(&e, disconnected);
                    return Some(self.retry.failure_delay);
                }
                None => {
                    debug!(channel = %self.channel(), "Subscribe stream ended");
                    return Some(self.retry.end_of_stream_delay);
                }
            }
        }
    }

    /// Advances the cursor and delivers one envelope to every listener.
    fn handle_envelope(&self, envelope: Envelope, disconnected: &mut bool) {
        let Envelope { messages, cursor } = envelope;

        trace!(
            channel = %self.channel(),
            cursor = %cursor,
            messages = messages.len(),
            "Envelope received"
        );

        *self.cursor.lock() = cursor.clone();

        let (listeners, first_connect) = {
            let mut set = self.listeners.lock();
            let first_connect = !set.connected && !cursor.is_now();
            if first_connect {
                set.connected = true;
            }
            (set.snapshot(), first_connect)
        };

        if first_connect {
            info!(channel = %self.channel(), cursor = %cursor, "Channel session connected");
            dispatch(&listeners, &SessionEvent::Connect { cursor });
        } else if *disconnected {
            info!(channel = %self.channel(), "Channel session reconnected");
            dispatch(&listeners, &SessionEvent::Reconnect);
        }
        *disconnected = false;

        for message in messages {
            dispatch(&listeners, &SessionEvent::Message(message));
        }
    }

    /// Raises `Disconnect` for the first failure after connecting.
    fn note_failure(&self, err: &Error, disconnected: &mut bool) {
        if *disconnected || !self.is_connected() {
            return;
        }

        *disconnected = true;
        let listeners = self.listeners.lock().snapshot();
        dispatch(
            &listeners,
            &SessionEvent::Disconnect {
                reason: err.to_string(),
            },
        );
    }

    /// Raises `Error` and stops the session.
    fn fail(&self, err: &Error) {
        error!(channel = %self.channel(), error = %err, "Channel session rejected");

        self.stop();

        let listeners = self.listeners.lock().snapshot();
        dispatch(
            &listeners,
            &SessionEvent::Error {
                reason: err.to_string(),
            },
        );
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Delivers one event to each listener in registration order.
#[inline]
fn dispatch(listeners: &[SessionListener], event: &SessionEvent) {
    for listener in listeners {
        listener(event);
    }
}

// ============================================================================
// Tests
// ============================================================================
