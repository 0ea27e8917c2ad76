//! HTTP transport layer.
//!
//! This module defines the seam between channel sessions and the network.
//! Sessions and the publisher only speak [`Transport`]; the production
//! implementation is [`HttpTransport`] on top of `reqwest`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   open_stream (GET, streamed)   ┌─────────────────┐
//! │  ChannelSession  │ ──────────────────────────────► │                 │
//! │                  │ ◄───── chunked body bytes ───── │  Pub/Sub        │
//! └──────────────────┘                                 │  service        │
//! ┌──────────────────┐        publish (POST)           │                 │
//! │  Publisher       │ ──────────────────────────────► │                 │
//! └──────────────────┘                                 └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `http` | `reqwest`-backed transport |

// ============================================================================
// Submodules
// ============================================================================

/// `reqwest`-backed transport.
pub mod http;

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use crate::error::Result;
use crate::protocol::{PublishRequest, PublishResponse, SubscribeRequest};

// ============================================================================
// Re-exports
// ============================================================================

pub use http::HttpTransport;

// ============================================================================
// Types
// ============================================================================

/// A streamed response body.
///
/// Dropping it aborts the underlying request.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

// ============================================================================
// Transport
// ============================================================================

/// Network operations needed by sessions and publishers.
///
/// Implementations must be cheap to share behind an `Arc`. Cancellation is
/// done by dropping the returned future or stream.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a streaming subscribe request and returns its body.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`](crate::Error::Connection) / [`Error::Http`](crate::Error::Http)
    ///   if the request cannot be opened
    /// - [`Error::Service`](crate::Error::Service) if the service answers with a
    ///   non-success status
    async fn open_stream(&self, request: &SubscribeRequest) -> Result<ByteStream>;

    /// Issues one publish request.
    ///
    /// Any HTTP response, success or not, is returned as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error only when no response was received.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse>;
}
