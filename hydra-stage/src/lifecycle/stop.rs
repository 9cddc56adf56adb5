//! Stop token shared between the worker and whoever requests the stop.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A token for cooperative stopping.
///
/// Stopping is idempotent - only the first reason is kept.
#[derive(Default)]
pub struct StopToken {
    /// Whether a stop has been requested.
    stopped: AtomicBool,
    /// The reason for stopping (first one wins).
    reason: RwLock<Option<String>>,
    /// Wakes tasks parked in [`StopToken::stopped`].
    notify: Notify,
}

impl StopToken {
    /// Creates a new stop token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop with a reason.
    ///
    /// Returns `true` if this call was the one that stopped the token.
    pub fn stop(&self, reason: impl Into<String>) -> bool {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.into());
            self.notify.notify_waiters();
            true
        } else {
            false
        }
    }

    /// Returns whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Returns the stop reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Completes once a stop has been requested.
    pub async fn stopped(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before checking so a concurrent stop cannot be missed
            notified.as_mut().enable();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for StopToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopToken")
            .field("stopped", &self.is_stopped())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_token_default_not_stopped() {
        let token = StopToken::new();
        assert!(!token.is_stopped());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_stop_idempotent() {
        let token = StopToken::new();
        assert!(token.stop("First reason"));
        assert!(!token.stop("Second reason"));

        // First reason wins
        assert!(token.is_stopped());
        assert_eq!(token.reason(), Some("First reason".to_string()));
    }

    #[tokio::test]
    async fn test_stopped_wakes_waiter() {
        let token = Arc::new(StopToken::new());
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.stopped().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        token.stop("test");
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[test]
    fn test_stopped_returns_immediately_when_already_stopped() {
        let token = StopToken::new();
        token.stop("early");
        tokio_test::block_on(token.stopped());
    }
}
