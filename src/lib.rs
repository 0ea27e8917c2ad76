//! PubNub Socket - A WebSocket-shaped client for HTTP streaming pub/sub.
//!
//! This library lets code written against a browser-style socket
//! (`onopen`, `onmessage`, `send`, `close`, `readyState`) talk to a
//! pub/sub service that only offers a streamed `GET /stream` endpoint
//! and a `POST /publish` endpoint.
//!
//! # Architecture
//!
//! ```text
//! Socket ──acquire──► SessionRegistry ──one per channel──► ChannelSession
//!   │                                                          │
//!   │ send                                       GET /stream   │
//!   ▼                                                          ▼
//! Publisher ────────── POST /publish ──────────► Transport ◄── StreamReader
//! ```
//!
//! Key design principles:
//!
//! - Every socket on a channel shares one streaming request
//! - Sessions retry forever from the last cursor until released
//! - The registry is an explicit value, not global state
//! - Socket methods never fail; problems arrive through `onerror`/`onclose`
//!
//! # Quick Start
//!
//! ```no_run
//! use pubnub_socket::{Result, SessionRegistry, Socket};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = SessionRegistry::http()?;
//!
//!     let socket = Socket::builder("wss://ps.pndsn.com/pub-key/sub-key/room")
//!         .on_open(|_| println!("open"))
//!         .on_message(|event| println!("received {} bytes", event.data.len()))
//!         .connect(&registry);
//!
//!     socket.send(b"hello").await;
//!     socket.close();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`codec`] | Binary payload text encoding |
//! | [`config`] | Connection parameters, defaults, retry policy |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Channel names and listener IDs |
//! | [`protocol`] | Envelopes, stream reader, request builders |
//! | [`publish`] | Outbound messages |
//! | [`session`] | Shared channel sessions and the registry |
//! | [`socket`] | The socket adapter |
//! | [`transport`] | HTTP transport |

// ============================================================================
// Modules
// ============================================================================

/// Binary payload text encoding.
pub mod codec;

/// Connection configuration.
///
/// Parameters come from a socket URL merged with [`ConnectionDefaults`],
/// or from [`ConnectionParamsBuilder`].
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire formats: envelopes, the stream reader, request builders.
pub mod protocol;

/// Outbound messages.
pub mod publish;

/// Shared channel sessions.
///
/// Use [`SessionRegistry::builder()`] to configure transport and retries.
pub mod session;

/// Socket adapter.
pub mod socket;

/// HTTP transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Codec
pub use codec::PayloadCodec;

// Config types
pub use config::{ConnectionDefaults, ConnectionParams, ConnectionParamsBuilder, RetryPolicy};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ChannelName, ListenerId};

// Protocol types
pub use protocol::{Envelope, StreamReader, Timetoken};

// Publish types
pub use publish::{PublishOutcome, Publisher};

// Session types
pub use session::{
    ChannelKey, ChannelSession, ListenerHandle, MessageReceiver, SessionEvent, SessionListener,
    SessionRegistry, SessionRegistryBuilder, SessionState,
};

// Socket types
pub use socket::{
    CloseCode, CloseEvent, ErrorEvent, MessageEvent, OpenEvent, ReadyState, SendEvent, Socket,
    SocketBuilder,
};

// Transport types
pub use transport::{HttpTransport, Transport};
