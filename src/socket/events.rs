//! Socket states, close codes, event records and handler slots.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol::Timetoken;
use crate::publish::PublishOutcome;

// ============================================================================
// ReadyState
// ============================================================================

/// Connection state, numbered like the browser `WebSocket.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Waiting for the first cursor.
    Connecting = 0,
    /// Receiving messages.
    Open = 1,
    /// Never entered; present for numbering.
    Closing = 2,
    /// Terminal. No further callbacks or requests.
    Closed = 3,
}

impl ReadyState {
    /// Returns the numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a numeric value.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Connecting),
            1 => Some(Self::Open),
            2 => Some(Self::Closing),
            3 => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

// ============================================================================
// CloseCode
// ============================================================================

/// WebSocket close codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    /// 1000.
    Normal = 1000,
    /// 1001.
    GoingAway = 1001,
    /// 1002.
    ProtocolError = 1002,
    /// 1003.
    Unsupported = 1003,
    /// 1004.
    TooLarge = 1004,
    /// 1005.
    NoStatus = 1005,
    /// Configuration failure or service rejection.
    Abnormal = 1006,
}

impl CloseCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

// ============================================================================
// Event Records
// ============================================================================

/// Passed to `onopen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEvent {
    /// Session cursor when the socket opened.
    pub cursor: Timetoken,
}

/// Passed to `onmessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Decoded payload.
    pub data: Vec<u8>,
}

/// Passed to `onsend` when a publish completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEvent {
    /// Publish result.
    pub data: PublishOutcome,
}

/// Passed to `onclose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close code. `None` for a caller-initiated close.
    pub code: Option<CloseCode>,
    /// Description of why the socket closed.
    pub reason: String,
    /// `false` when the service ended the connection.
    pub was_clean: bool,
}

impl CloseEvent {
    /// Caller-initiated close.
    #[inline]
    #[must_use]
    pub fn local() -> Self {
        Self {
            code: None,
            reason: String::new(),
            was_clean: true,
        }
    }

    /// Abnormal close (code 1006).
    #[inline]
    #[must_use]
    pub fn abnormal(reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code: Some(CloseCode::Abnormal),
            reason: reason.into(),
            was_clean,
        }
    }
}

/// Passed to `onerror`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Description of the failure.
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Shared handler callback.
pub type Handler<E> = Arc<dyn Fn(E) + Send + Sync>;

/// One settable callback. Last writer wins.
pub(crate) struct HandlerSlot<E> {
    handler: Mutex<Option<Handler<E>>>,
}

impl<E> Default for HandlerSlot<E> {
    fn default() -> Self {
        Self {
            handler: Mutex::new(None),
        }
    }
}

impl<E> HandlerSlot<E> {
    pub(crate) fn set(&self, handler: Handler<E>) {
        *self.handler.lock() = Some(handler);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Invokes the current handler, if any.
    ///
    /// The lock is released before the call, so a handler may replace
    /// any slot, including its own.
    pub(crate) fn call(&self, event: E) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }
}

/// The five socket callbacks.
#[derive(Default)]
pub(crate) struct Handlers {
    pub(crate) onopen: HandlerSlot<OpenEvent>,
    pub(crate) onmessage: HandlerSlot<MessageEvent>,
    pub(crate) onerror: HandlerSlot<ErrorEvent>,
    pub(crate) onclose: HandlerSlot<CloseEvent>,
    pub(crate) onsend: HandlerSlot<SendEvent>,
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("onopen", &self.onopen.is_set())
            .field("onmessage", &self.onmessage.is_set())
            .field("onerror", &self.onerror.is_set())
            .field("onclose", &self.onclose.is_set())
            .field("onsend", &self.onsend.is_set())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
