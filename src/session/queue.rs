//! Pull-style message queue over a shared session.

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::identifiers::ChannelName;

use super::registry::ListenerHandle;

// ============================================================================
// MessageReceiver
// ============================================================================

/// Bounded queue of messages from one channel.
///
/// Created by [`SessionRegistry::subscribe_messages`](super::SessionRegistry::subscribe_messages).
/// Dropping the receiver releases its listener.
///
/// Also usable as a [`Stream`] of messages.
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::Receiver<Value>,
    handle: ListenerHandle,
}

impl MessageReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<Value>, handle: ListenerHandle) -> Self {
        Self { rx, handle }
    }

    /// Returns the channel this queue is subscribed to.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &ChannelName {
        self.handle.key().channel()
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the session has been rejected or the receiver
    /// was closed, and every queued message has been taken.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Returns the next message if one is queued.
    #[must_use]
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }

    /// Releases the listener. Queued messages stay readable.
    pub fn close(&mut self) {
        self.handle.release();
        self.rx.close();
    }
}

impl Stream for MessageReceiver {
    type Item = Value;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
