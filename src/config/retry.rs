//! Restart delays for channel sessions.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Delay after a failed request or read.
pub const DEFAULT_FAILURE_DELAY: Duration = Duration::from_millis(1000);

/// Delay after the service ends a stream normally.
pub const DEFAULT_END_OF_STREAM_DELAY: Duration = Duration::from_millis(1);

// ============================================================================
// RetryPolicy
// ============================================================================

/// Fixed-delay restart policy.
///
/// Sessions retry forever; only an explicit stop ends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after a request-open, body, or read failure.
    pub failure_delay: Duration,
    /// Wait after a clean end-of-stream.
    pub end_of_stream_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy {
    /// Creates the default policy (1000 ms / 1 ms).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failure_delay: DEFAULT_FAILURE_DELAY,
            end_of_stream_delay: DEFAULT_END_OF_STREAM_DELAY,
        }
    }

    /// Sets the failure delay.
    #[inline]
    #[must_use]
    pub const fn with_failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    /// Sets the end-of-stream delay.
    #[inline]
    #[must_use]
    pub const fn with_end_of_stream_delay(mut self, delay: Duration) -> Self {
        self.end_of_stream_delay = delay;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
