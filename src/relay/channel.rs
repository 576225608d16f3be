//! Best-effort notice channel.
//!
//! The interception hooks are synchronous and must never block or fail
//! because a consumer is slow or gone. Sends go over an unbounded channel
//! and complete immediately; a closed channel is logged at debug level and
//! otherwise ignored.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::Notice;

// ============================================================================
// Channel Construction
// ============================================================================

/// Creates a connected notice channel.
#[must_use]
pub fn channel() -> (NoticeSender, NoticeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NoticeSender { tx: Some(tx) }, NoticeReceiver { rx })
}

// ============================================================================
// NoticeSender
// ============================================================================

/// Sending half of the notice channel.
///
/// Cloneable; a monitor built without a relay uses a disconnected sender
/// whose sends are no-ops.
#[derive(Clone)]
pub struct NoticeSender {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl fmt::Debug for NoticeSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoticeSender")
            .field("connected", &self.tx.is_some())
            .finish()
    }
}

impl NoticeSender {
    /// Creates a sender with no receiver.
    #[must_use]
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Sends a notice without blocking.
    ///
    /// Delivery is at-most-once: a missing or dropped receiver swallows
    /// the notice.
    pub fn send(&self, notice: Notice) {
        match &self.tx {
            Some(tx) => {
                if tx.send(notice).is_err() {
                    debug!("Notice dropped: relay receiver gone");
                }
            }
            None => trace!("Notice dropped: no relay attached"),
        }
    }
}

// ============================================================================
// NoticeReceiver
// ============================================================================

/// Receiving half of the notice channel.
pub struct NoticeReceiver {
    rx: mpsc::UnboundedReceiver<Notice>,
}

impl fmt::Debug for NoticeReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoticeReceiver").finish_non_exhaustive()
    }
}

impl NoticeReceiver {
    /// Waits for the next notice.
    ///
    /// Returns `None` once all senders are gone.
    pub async fn recv(&mut self) -> Option<Notice> {
        self.rx.recv().await
    }

    /// Polls for a notice without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] once all senders are gone.
    pub fn try_recv(&mut self) -> Result<Option<Notice>> {
        match self.rx.try_recv() {
            Ok(notice) => Ok(Some(notice)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(Error::ChannelClosed),
        }
    }

    /// Drains all currently queued notices.
    pub fn drain(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(Some(notice)) = self.try_recv() {
            notices.push(notice);
        }
        notices
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::ContextId;

    fn frame_notice() -> Notice {
        Notice::RegisterFrame {
            context_id: ContextId::generate(),
            origin: "https://app.example".into(),
            path: "top".into(),
            listeners: vec![],
        }
    }

    #[tokio::test]
    async fn test_send_and_recv() {
        let (tx, mut rx) = channel();
        tx.send(frame_notice());

        let notice = rx.recv().await.expect("notice");
        assert!(matches!(notice, Notice::RegisterFrame { .. }));
    }

    #[test]
    fn test_send_to_dropped_receiver_is_swallowed() {
        let (tx, rx) = channel();
        drop(rx);

        // Must not panic or block.
        tx.send(frame_notice());
    }

    #[test]
    fn test_disconnected_sender_is_noop() {
        let sender = NoticeSender::disconnected();
        sender.send(frame_notice());
    }

    #[test]
    fn test_try_recv_empty_and_closed() {
        let (tx, mut rx) = channel();
        assert!(rx.try_recv().expect("empty").is_none());

        tx.send(frame_notice());
        assert!(rx.try_recv().expect("one").is_some());

        drop(tx);
        assert!(matches!(rx.try_recv(), Err(Error::ChannelClosed)));
    }

    #[test]
    fn test_recv_ends_after_senders_gone() {
        let (tx, mut rx) = channel();
        tx.send(frame_notice());
        drop(tx);

        tokio_test::block_on(async {
            assert!(rx.recv().await.is_some());
            assert!(rx.recv().await.is_none());
        });
    }

    #[test]
    fn test_drain_preserves_order() {
        let (tx, mut rx) = channel();
        tx.send(frame_notice());
        tx.send(Notice::UpdateListeners {
            context_id: ContextId::generate(),
            listeners: vec![],
        });

        let drained = rx.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Notice::RegisterFrame { .. }));
        assert!(matches!(drained[1], Notice::UpdateListeners { .. }));
    }
}
