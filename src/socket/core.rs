//! Socket type and its session wiring.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::codec::PayloadCodec;
use crate::config::ConnectionParams;
use crate::identifiers::ChannelName;
use crate::protocol::Timetoken;
use crate::publish::{PublishOutcome, Publisher};
use crate::session::{ListenerHandle, SessionEvent, SessionRegistry};

use super::builder::SocketBuilder;
use super::events::{
    CloseEvent, ErrorEvent, Handlers, MessageEvent, OpenEvent, ReadyState, SendEvent,
};

// ============================================================================
// Constants
// ============================================================================

/// Value reported by [`Socket::protocol`] when none is given.
pub const DEFAULT_PROTOCOL: &str = "Sec-WebSocket-Protocol";

/// Value reported by [`Socket::binary_type`] by default.
pub const DEFAULT_BINARY_TYPE: &str = "arraybuffer";

// ============================================================================
// SocketInner
// ============================================================================

/// Shared state behind every [`Socket`] clone.
pub(crate) struct SocketInner {
    url: String,
    protocol: String,
    binary_type: RwLock<String>,
    params: Option<ConnectionParams>,
    codec: PayloadCodec,
    publisher: Option<Publisher>,
    state: AtomicU8,
    buffered: AtomicU64,
    pub(crate) handlers: Handlers,
    handle: Mutex<Option<ListenerHandle>>,
}

impl SocketInner {
    #[inline]
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst)).unwrap_or(ReadyState::Closed)
    }

    #[inline]
    fn is_closed(&self) -> bool {
        self.ready_state() == ReadyState::Closed
    }

    /// Moves to `Closed`. Returns `false` if already closed.
    fn transition_closed(&self) -> bool {
        self.state.swap(ReadyState::Closed.as_u8(), Ordering::SeqCst) != ReadyState::Closed.as_u8()
    }

    /// `Connecting → Open` and `onopen`, at most once.
    fn mark_open(&self, cursor: Timetoken) {
        let opened = self
            .state
            .compare_exchange(
                ReadyState::Connecting.as_u8(),
                ReadyState::Open.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if opened {
            info!(url = %self.url, cursor = %cursor, "Socket open");
            self.handlers.onopen.call(OpenEvent { cursor });
        }
    }

    fn release_handle(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle.release();
        }
    }

    /// Maps one session event onto socket state and callbacks.
    fn handle_session_event(&self, event: &SessionEvent) {
        if self.is_closed() {
            return;
        }

        match event {
            SessionEvent::Connect { cursor } => self.mark_open(cursor.clone()),

            SessionEvent::Message(value) => match self.codec.decode_value(value) {
                Ok(data) => self.handlers.onmessage.call(MessageEvent { data }),
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Undecodable message");
                    self.handlers.onerror.call(ErrorEvent {
                        message: e.to_string(),
                    });
                }
            },

            SessionEvent::Disconnect { reason } => {
                self.handlers.onerror.call(ErrorEvent {
                    message: reason.clone(),
                });
            }

            SessionEvent::Reconnect => {
                debug!(url = %self.url, "Session reconnected");
            }

            SessionEvent::Error { reason } => {
                if self.transition_closed() {
                    warn!(url = %self.url, reason = %reason, "Socket closed by service");
                    self.release_handle();
                    self.handlers
                        .onclose
                        .call(CloseEvent::abnormal(reason.clone(), false));
                }
            }
        }
    }
}

// ============================================================================
// Socket
// ============================================================================

/// A socket-shaped view of one pub/sub channel.
///
/// Cloning is cheap; clones share state and handlers. The socket's
/// listener is released on [`close`](Self::close) or when the last clone
/// is dropped.
///
/// A handler that captures a clone of its own socket keeps the socket
/// alive, so dropping the other clones does not release the listener.
/// Call [`close`](Self::close) in that case.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> pubnub_socket::Result<()> {
/// use pubnub_socket::{SessionRegistry, Socket};
///
/// let registry = SessionRegistry::http()?;
/// let socket = Socket::builder("wss://ps.pndsn.com/pub-key/sub-key/room")
///     .on_message(|event| println!("{} bytes", event.data.len()))
///     .connect(&registry);
///
/// socket.send(b"hello").await;
/// socket.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Socket {
    pub(crate) inner: Arc<SocketInner>,
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("url", &self.inner.url)
            .field("ready_state", &self.ready_state())
            .field("buffered_amount", &self.buffered_amount())
            .field("handlers", &self.inner.handlers)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Socket - Constructor
// ============================================================================

impl Socket {
    /// Creates a builder for `url`.
    #[inline]
    #[must_use]
    pub fn builder(url: impl Into<String>) -> SocketBuilder {
        SocketBuilder::new(url)
    }

    /// Connects to `url` with default settings.
    #[must_use]
    pub fn connect(url: impl Into<String>, registry: &Arc<SessionRegistry>) -> Self {
        SocketBuilder::new(url).connect(registry)
    }

    /// Wires a socket from builder parts.
    pub(crate) fn open(builder: SocketBuilder, registry: &Arc<SessionRegistry>) -> Self {
        let SocketBuilder {
            url,
            protocol,
            binary_type,
            defaults,
            codec,
            metadata,
            handlers,
        } = builder;

        let parsed = ConnectionParams::from_url(&url, &defaults);

        let (params, publisher) = match &parsed {
            Ok(params) => {
                let publisher = Publisher::new(Arc::clone(registry.transport()), params.clone())
                    .with_codec(codec)
                    .with_metadata(metadata);
                (Some(params.clone()), Some(publisher))
            }
            Err(_) => (None, None),
        };

        let inner = Arc::new(SocketInner {
            url,
            protocol: protocol.unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            binary_type: RwLock::new(binary_type),
            params,
            codec,
            publisher,
            state: AtomicU8::new(ReadyState::Connecting.as_u8()),
            buffered: AtomicU64::new(0),
            handlers,
            handle: Mutex::new(None),
        });

        let params = match parsed {
            Ok(params) => params,
            Err(e) => {
                warn!(url = %inner.url, error = %e, "Socket configuration rejected");
                inner.transition_closed();
                inner.handlers.onclose.call(CloseEvent::abnormal(e.to_string(), true));
                return Self { inner };
            }
        };

        let weak = Arc::downgrade(&inner);
        let handle = registry.acquire(
            &params,
            Arc::new(move |event: &SessionEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_session_event(event);
                }
            }),
        );

        debug!(url = %inner.url, channel = %params.channel(), listener = %handle.id(), "Socket subscribed");

        let connected = handle.session_connected();
        *inner.handle.lock() = Some(handle);

        if inner.is_closed() {
            // Rejected before the handle was stored.
            inner.release_handle();
        } else if connected {
            let cursor = registry
                .session(&params)
                .map(|session| session.cursor())
                .unwrap_or_default();
            inner.mark_open(cursor);
        }

        Self { inner }
    }
}

// ============================================================================
// Socket - Accessors
// ============================================================================

impl Socket {
    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.inner.ready_state()
    }

    /// Returns the URL the socket was created with.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Returns the sub-protocol string.
    #[inline]
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.inner.protocol
    }

    /// Always empty.
    #[inline]
    #[must_use]
    pub fn extensions(&self) -> &str {
        ""
    }

    /// Returns the binary type label.
    #[inline]
    #[must_use]
    pub fn binary_type(&self) -> String {
        self.inner.binary_type.read().clone()
    }

    /// Sets the binary type label. Payloads are always delivered as bytes.
    pub fn set_binary_type(&self, binary_type: impl Into<String>) {
        *self.inner.binary_type.write() = binary_type.into();
    }

    /// Returns the number of bytes in sends that have not completed.
    #[inline]
    #[must_use]
    pub fn buffered_amount(&self) -> u64 {
        self.inner.buffered.load(Ordering::SeqCst)
    }

    /// Returns the connection parameters, if the URL was usable.
    #[inline]
    #[must_use]
    pub fn params(&self) -> Option<&ConnectionParams> {
        self.inner.params.as_ref()
    }

    /// Returns the channel, if the URL was usable.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> Option<&ChannelName> {
        self.inner.params.as_ref().map(ConnectionParams::channel)
    }
}

// ============================================================================
// Socket - Handlers
// ============================================================================

impl Socket {
    /// Sets the open handler.
    pub fn set_onopen(&self, handler: impl Fn(OpenEvent) + Send + Sync + 'static) {
        self.inner.handlers.onopen.set(Arc::new(handler));
    }

    /// Sets the message handler.
    pub fn set_onmessage(&self, handler: impl Fn(MessageEvent) + Send + Sync + 'static) {
        self.inner.handlers.onmessage.set(Arc::new(handler));
    }

    /// Sets the error handler.
    pub fn set_onerror(&self, handler: impl Fn(ErrorEvent) + Send + Sync + 'static) {
        self.inner.handlers.onerror.set(Arc::new(handler));
    }

    /// Sets the close handler.
    pub fn set_onclose(&self, handler: impl Fn(CloseEvent) + Send + Sync + 'static) {
        self.inner.handlers.onclose.set(Arc::new(handler));
    }

    /// Sets the send-completion handler.
    pub fn set_onsend(&self, handler: impl Fn(SendEvent) + Send + Sync + 'static) {
        self.inner.handlers.onsend.set(Arc::new(handler));
    }
}

// ============================================================================
// Socket - Operations
// ============================================================================

impl Socket {
    /// Publishes `data` to the channel.
    ///
    /// Fires `onsend` with the outcome unless the socket closed meanwhile.
    /// On a closed socket nothing is sent and [`PublishOutcome::Failed`]
    /// is returned without a callback.
    pub async fn send(&self, data: impl AsRef<[u8]>) -> PublishOutcome {
        let data = data.as_ref();

        let Some(publisher) = self.inner.publisher.as_ref() else {
            return PublishOutcome::Failed;
        };
        if self.inner.is_closed() {
            debug!(url = %self.inner.url, "Send on closed socket ignored");
            return PublishOutcome::Failed;
        }

        let len = data.len() as u64;
        self.inner.buffered.fetch_add(len, Ordering::SeqCst);
        let outcome = publisher.publish(data).await;
        self.inner.buffered.fetch_sub(len, Ordering::SeqCst);

        if !self.inner.is_closed() {
            self.inner.handlers.onsend.call(SendEvent {
                data: outcome.clone(),
            });
        }

        outcome
    }

    /// Closes the socket and fires `onclose`. Idempotent.
    pub fn close(&self) {
        if !self.inner.transition_closed() {
            return;
        }

        self.inner.release_handle();
        info!(url = %self.inner.url, "Socket closed");
        self.inner.handlers.onclose.call(CloseEvent::local());
    }
}
