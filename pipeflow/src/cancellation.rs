//! Cancellation token for cooperative pipeline cancellation.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A token for cooperative cancellation of a running pipeline.
///
/// Cancellation is idempotent - only the first cancellation reason is kept.
/// The engine races [`cancelled`](Self::cancelled) against the pipeline
/// future, so on cancellation the stream is dropped at its current
/// suspension point and no further store calls are made.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Wakes tasks waiting in `cancelled()`.
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent - only the first reason is kept. Waiters in
    /// [`cancelled`](Self::cancelled) are woken once the reason is stored.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.into());
            self.notify.notify_waiters();
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Waits until the token is cancelled and returns the reason.
    pub async fn cancelled(&self) -> String {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before re-checking, so a cancel in between still wakes us
            notified.as_mut().enable();
            if self.is_cancelled() {
                return self.current_reason();
            }
            notified.await;
        }
    }

    fn current_reason(&self) -> String {
        self.reason().unwrap_or_else(|| "cancelled".to_string())
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
