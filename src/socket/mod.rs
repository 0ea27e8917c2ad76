//! Socket-shaped adapter over a shared channel session.
//!
//! A [`Socket`] behaves like a browser `WebSocket`: it has a
//! [`ReadyState`], five callbacks, `send` and `close`. Receiving is backed
//! by the channel's [`ChannelSession`](crate::session::ChannelSession);
//! sending is one publish request per call.
//!
//! # Event Mapping
//!
//! | Session event | Socket effect |
//! |---------------|---------------|
//! | `Connect` | `Open`, `onopen` |
//! | `Message` | decode, `onmessage` |
//! | `Disconnect` | `onerror` |
//! | `Reconnect` | logged only |
//! | `Error` | `Closed`, `onclose` (1006, unclean) |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`SocketBuilder`] |
//! | `core` | [`Socket`] |
//! | `events` | States, close codes, event records |

// ============================================================================
// Submodules
// ============================================================================

/// Socket builder.
pub mod builder;

/// Socket type.
pub mod core;

/// States, close codes, event records.
pub mod events;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SocketBuilder;
pub use core::{DEFAULT_BINARY_TYPE, DEFAULT_PROTOCOL, Socket};
pub use events::{
    CloseCode, CloseEvent, ErrorEvent, Handler, MessageEvent, OpenEvent, ReadyState, SendEvent,
};

// ============================================================================
// Tests
// ============================================================================
