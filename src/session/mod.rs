//! Shared channel sessions.
//!
//! A session runs the long-lived subscribe loop for one channel and fans
//! its messages out to any number of listeners. The registry makes sure
//! each channel has at most one session.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Subscribe loop and listener fan-out |
//! | `queue` | Pull-style message queue |
//! | `registry` | Per-channel session table |

// ============================================================================
// Submodules
// ============================================================================

/// Subscribe loop and listener fan-out.
pub mod channel;

/// Pull-style message queue.
pub mod queue;

/// Per-channel session table.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{ChannelSession, Registration, SessionEvent, SessionListener, SessionState};
pub use queue::MessageReceiver;
pub use registry::{ChannelKey, ListenerHandle, SessionRegistry, SessionRegistryBuilder};
