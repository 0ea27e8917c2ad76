//! Connection configuration.
//!
//! Configuration flows as explicit values: [`ConnectionDefaults`] supplies
//! fallbacks, a socket URL or [`ConnectionParamsBuilder`] produces
//! immutable [`ConnectionParams`], and [`RetryPolicy`] controls session
//! restarts.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent builder for parameters |
//! | `params` | Parameters, defaults, URL parsing |
//! | `retry` | Session restart delays |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for [`ConnectionParams`].
pub mod builder;

/// Connection parameters and URL parsing.
pub mod params;

/// Session restart delays.
pub mod retry;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionParamsBuilder;
pub use params::{ConnectionDefaults, ConnectionParams, DEFAULT_DEMO_KEY, DEFAULT_ORIGIN};
pub use retry::RetryPolicy;
