//! Wire protocol of the streaming publish/subscribe service.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `SubscribeRequest` | Local → Service | Open a streamed GET at a cursor |
//! | `Envelope` | Service → Local | One newline-delimited record: messages + next cursor |
//! | `PublishRequest` | Local → Service | One POST per outbound message |
//! | `PublishResponse` | Service → Local | Publish acknowledgement |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | `Envelope` and the `Timetoken` cursor |
//! | `reader` | Incremental chunk → envelope decoder |
//! | `request` | Request URL construction and publish responses |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope and cursor types.
pub mod envelope;

/// Incremental stream reader.
pub mod reader;

/// Subscribe and publish request types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Envelope, Timetoken};
pub use reader::{DEFAULT_MAX_BUFFER, StreamReader, envelope_stream};
pub use request::{PublishRequest, PublishResponse, SubscribeRequest};
