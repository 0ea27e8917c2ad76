//! Process-wide table of channel sessions.
//!
//! Every socket for the same `(origin, subscribe key, channel)` shares one
//! [`ChannelSession`]. The first listener creates and starts it; the last
//! listener to leave stops and evicts it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               SessionRegistry                │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ (origin, sub, "lobby") → ChannelSession│  │
//! │  │ (origin, sub, "chat")  → ChannelSession│  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//!            ▲ acquire             │ ListenerHandle (drop = release)
//!            │                     ▼
//!        Socket / MessageReceiver
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ConnectionParams, RetryPolicy};
use crate::error::{Error, Result};
use crate::identifiers::{ChannelName, ListenerId};
use crate::protocol::DEFAULT_MAX_BUFFER;
use crate::transport::{HttpTransport, Transport};

use super::channel::{ChannelSession, SessionEvent, SessionListener};
use super::queue::MessageReceiver;

// ============================================================================
// ChannelKey
// ============================================================================

/// Identity of a shared session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    origin: String,
    subscribe_key: String,
    channel: ChannelName,
}

impl ChannelKey {
    /// Derives the key for a set of connection parameters.
    #[must_use]
    pub fn from_params(params: &ConnectionParams) -> Self {
        Self {
            origin: params.origin().to_string(),
            subscribe_key: params.subscribe_key().to_string(),
            channel: params.channel().clone(),
        }
    }

    /// Returns the channel.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.origin, self.subscribe_key, self.channel)
    }
}

// ============================================================================
// SessionRegistry
// ============================================================================

/// Shares one [`ChannelSession`] per channel among all listeners.
///
/// Thread-safe. Create one per process (or per test) and pass it to
/// every socket.
///
/// Each session's stream reader holds at most
/// [`max_buffer`](SessionRegistryBuilder::max_buffer) unconsumed bytes
/// (4 MiB by default). A record that grows past that limit is dropped with
/// a warning and the stream continues with the next one.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> pubnub_socket::Result<()> {
/// use pubnub_socket::SessionRegistry;
///
/// let registry = SessionRegistry::http()?;
/// println!("sessions: {}", registry.session_count());
/// # Ok(())
/// # }
/// ```
pub struct SessionRegistry {
    /// Network operations shared by every session.
    transport: Arc<dyn Transport>,

    /// Runtime that runs session loops.
    runtime: Handle,

    /// Restart delays for new sessions.
    retry: RetryPolicy,

    /// Stream reader cap for new sessions.
    max_buffer: usize,

    /// Live sessions by key.
    sessions: RwLock<FxHashMap<ChannelKey, Arc<ChannelSession>>>,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.session_count())
            .field("retry", &self.retry)
            .field("max_buffer", &self.max_buffer)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionRegistry - Constructor
// ============================================================================

impl SessionRegistry {
    /// Creates a registry over `transport` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if called outside a Tokio runtime.
    pub fn new(transport: Arc<dyn Transport>) -> Result<Arc<Self>> {
        Self::builder().transport(transport).build()
    }

    /// Creates a registry over a default [`HttpTransport`].
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] if the HTTP client cannot be built
    /// - [`Error::Config`] if called outside a Tokio runtime
    pub fn http() -> Result<Arc<Self>> {
        Self::builder().build()
    }

    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionRegistryBuilder {
        SessionRegistryBuilder::new()
    }
}

// ============================================================================
// SessionRegistry - Public API
// ============================================================================

impl SessionRegistry {
    /// Returns the shared transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Returns the restart policy given to new sessions.
    #[inline]
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Returns the number of live sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns the number of listeners on the session for `params`.
    #[must_use]
    pub fn listener_count(&self, params: &ConnectionParams) -> usize {
        self.sessions
            .read()
            .get(&ChannelKey::from_params(params))
            .map_or(0, |session| session.listener_count())
    }

    /// Returns the session for `params`, if one is live.
    #[must_use]
    pub fn session(&self, params: &ConnectionParams) -> Option<Arc<ChannelSession>> {
        self.sessions
            .read()
            .get(&ChannelKey::from_params(params))
            .cloned()
    }

    /// Registers `listener` on the session for `params`, creating and
    /// starting the session if needed. A stopped session is replaced.
    ///
    /// The returned handle unregisters the listener when dropped.
    pub fn acquire(
        self: &Arc<Self>,
        params: &ConnectionParams,
        listener: SessionListener,
    ) -> ListenerHandle {
        let key = ChannelKey::from_params(params);
        let mut sessions = self.sessions.write();

        let (session, registration) = loop {
            let session = match sessions.get(&key) {
                Some(session) if !session.is_stopped() => Arc::clone(session),
                _ => {
                    let session = ChannelSession::new(
                        params.clone(),
                        Arc::clone(&self.transport),
                        self.retry,
                        self.max_buffer,
                    );
                    sessions.insert(key.clone(), Arc::clone(&session));
                    debug!(key = %key, "Channel session created");
                    session
                }
            };

            // Stopped between the check and the add: replace it.
            match session.add_listener(Arc::clone(&listener)) {
                Ok(registration) => break (session, registration),
                Err(_) => {
                    sessions.remove(&key);
                }
            }
        };

        session.start(&self.runtime);
        drop(sessions);

        ListenerHandle {
            registry: Arc::downgrade(self),
            key,
            id: registration.id,
            connected: registration.connected,
            released: AtomicBool::new(false),
        }
    }

    /// Subscribes a pull queue to the session for `params`.
    ///
    /// Holds at most `capacity` undelivered messages; further messages
    /// are dropped with a warning until the consumer catches up. The queue
    /// ends when the session is rejected or the receiver is dropped.
    pub fn subscribe_messages(
        self: &Arc<Self>,
        params: &ConnectionParams,
        capacity: usize,
    ) -> MessageReceiver {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let channel = params.channel().clone();
        let sender = parking_lot::Mutex::new(Some(tx));

        let listener: SessionListener = Arc::new(move |event: &SessionEvent| match event {
            SessionEvent::Message(message) => {
                let guard = sender.lock();
                if let Some(tx) = guard.as_ref()
                    && let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(message.clone())
                {
                    warn!(channel = %channel, "Message queue full, dropping message");
                }
            }
            SessionEvent::Error { .. } => {
                sender.lock().take();
            }
            _ => {}
        });

        let handle = self.acquire(params, listener);
        MessageReceiver::new(rx, handle)
    }

    /// Releases a listener. Returns `false` if already released.
    pub fn release(&self, handle: &ListenerHandle) -> bool {
        if handle.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.release_listener(&handle.key, handle.id);
        true
    }

    /// Stops every session and clears the table.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.sessions.write().drain().collect();

        for (_, session) in &drained {
            session.stop();
        }

        info!(count = drained.len(), "SessionRegistry shutdown complete");
    }
}

// ============================================================================
// SessionRegistry - Internal
// ============================================================================

impl SessionRegistry {
    /// Removes a listener; stops and evicts the session once it is empty.
    fn release_listener(&self, key: &ChannelKey, id: ListenerId) {
        let mut sessions = self.sessions.write();

        let Some(session) = sessions.get(key) else {
            return;
        };

        session.remove_listener(id);

        if session.listener_count() == 0 {
            session.stop();
            sessions.remove(key);
            debug!(key = %key, "Channel session evicted");
        }
    }
}

// ============================================================================
// SessionRegistryBuilder
// ============================================================================

/// Builder for [`SessionRegistry`].
#[derive(Default)]
pub struct SessionRegistryBuilder {
    transport: Option<Arc<dyn Transport>>,
    runtime: Option<Handle>,
    retry: RetryPolicy,
    max_buffer: Option<usize>,
}

impl SessionRegistryBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport. Defaults to [`HttpTransport`].
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the runtime that runs session loops.
    ///
    /// Defaults to the runtime current at [`build`](Self::build).
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the restart policy.
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the stream reader buffer cap in bytes.
    ///
    /// Defaults to [`DEFAULT_MAX_BUFFER`]. A single record larger than the
    /// cap is discarded, so it must exceed the largest envelope the service
    /// can send.
    #[must_use]
    pub fn max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer = Some(bytes);
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no runtime was given and none is current
    /// - [`Error::Config`] if the buffer cap is zero
    /// - [`Error::Http`] if the default HTTP client cannot be built
    pub fn build(self) -> Result<Arc<SessionRegistry>> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| {
                Error::config("SessionRegistry needs a Tokio runtime; build it inside one or call .runtime()")
            })?,
        };

        let max_buffer = self.max_buffer.unwrap_or(DEFAULT_MAX_BUFFER);
        if max_buffer == 0 {
            return Err(Error::config("max_buffer must be greater than zero"));
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };

        debug!(max_buffer, retry = ?self.retry, "SessionRegistry built");

        Ok(Arc::new(SessionRegistry {
            transport,
            runtime,
            retry: self.retry,
            max_buffer,
            sessions: RwLock::new(FxHashMap::default()),
        }))
    }
}

// ============================================================================
// ListenerHandle
// ============================================================================

/// A registration on a shared session. Dropping it releases the listener.
pub struct ListenerHandle {
    registry: Weak<SessionRegistry>,
    key: ChannelKey,
    id: ListenerId,
    connected: bool,
    released: AtomicBool,
}

impl ListenerHandle {
    /// Returns the listener ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Returns the session key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    /// Returns `true` if the session had already connected at registration.
    #[inline]
    #[must_use]
    pub fn session_connected(&self) -> bool {
        self.connected
    }

    /// Returns `true` once released.
    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Releases the listener now. Idempotent.
    pub fn release(&self) {
        match self.registry.upgrade() {
            Some(registry) => {
                registry.release(self);
            }
            None => self.released.store(true, Ordering::SeqCst),
        }
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

// ============================================================================
// Tests
// ============================================================================
