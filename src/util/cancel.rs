//! Scoped cancellation token for follow-mode streams (spec §5), modeled on
//! the broadcast-channel shutdown signal used by the ingestion scheduler.

use tokio::sync::watch;

/// Cloneable cancellation handle. Cancelling is idempotent and visible to
/// every clone and to the future returned by [`CancelToken::cancelled`].
#[derive(Clone)]
pub struct CancelToken {
    tx: watch::Sender<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if *rx.borrow() {
            return;
        }
        // Only errs if every sender (including `self`) is dropped, which
        // can't happen while `self` is alive.
        let _ = rx.changed().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
