//! Builder for [`Socket`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;

use crate::codec::PayloadCodec;
use crate::config::ConnectionDefaults;
use crate::session::SessionRegistry;

use super::core::{DEFAULT_BINARY_TYPE, Socket};
use super::events::{CloseEvent, ErrorEvent, Handlers, MessageEvent, OpenEvent, SendEvent};

// ============================================================================
// SocketBuilder
// ============================================================================

/// Configures and connects a [`Socket`].
///
/// Handlers set here are in place before connecting, so they observe
/// events raised during construction, such as the close of a socket
/// with an unusable URL.
pub struct SocketBuilder {
    pub(crate) url: String,
    pub(crate) protocol: Option<String>,
    pub(crate) binary_type: String,
    pub(crate) defaults: ConnectionDefaults,
    pub(crate) codec: PayloadCodec,
    pub(crate) metadata: Value,
    pub(crate) handlers: Handlers,
}

impl std::fmt::Debug for SocketBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketBuilder")
            .field("url", &self.url)
            .field("protocol", &self.protocol)
            .field("codec", &self.codec)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl SocketBuilder {
    /// Creates a builder for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocol: None,
            binary_type: DEFAULT_BINARY_TYPE.to_string(),
            defaults: ConnectionDefaults::default(),
            codec: PayloadCodec::default(),
            metadata: Value::Object(serde_json::Map::new()),
            handlers: Handlers::default(),
        }
    }

    /// Sets the sub-protocol string reported by [`Socket::protocol`].
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Sets the binary type label.
    #[must_use]
    pub fn binary_type(mut self, binary_type: impl Into<String>) -> Self {
        self.binary_type = binary_type.into();
        self
    }

    /// Sets the fallbacks for values the URL leaves out.
    #[must_use]
    pub fn defaults(mut self, defaults: ConnectionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sets the payload codec.
    #[must_use]
    pub fn codec(mut self, codec: PayloadCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the metadata attached to every publish. Defaults to `{}`.
    #[must_use]
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the open handler.
    #[must_use]
    pub fn on_open(self, handler: impl Fn(OpenEvent) + Send + Sync + 'static) -> Self {
        self.handlers.onopen.set(Arc::new(handler));
        self
    }

    /// Sets the message handler.
    #[must_use]
    pub fn on_message(self, handler: impl Fn(MessageEvent) + Send + Sync + 'static) -> Self {
        self.handlers.onmessage.set(Arc::new(handler));
        self
    }

    /// Sets the error handler.
    #[must_use]
    pub fn on_error(self, handler: impl Fn(ErrorEvent) + Send + Sync + 'static) -> Self {
        self.handlers.onerror.set(Arc::new(handler));
        self
    }

    /// Sets the close handler.
    #[must_use]
    pub fn on_close(self, handler: impl Fn(CloseEvent) + Send + Sync + 'static) -> Self {
        self.handlers.onclose.set(Arc::new(handler));
        self
    }

    /// Sets the send-completion handler.
    #[must_use]
    pub fn on_send(self, handler: impl Fn(SendEvent) + Send + Sync + 'static) -> Self {
        self.handlers.onsend.set(Arc::new(handler));
        self
    }

    /// Derives connection parameters and subscribes.
    ///
    /// Never fails: an unusable URL yields a socket that is already
    /// `Closed` and has fired `onclose` with code 1006.
    #[must_use]
    pub fn connect(self, registry: &Arc<SessionRegistry>) -> Socket {
        Socket::open(self, registry)
    }
}
