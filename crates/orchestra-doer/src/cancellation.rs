//! Cooperative cancellation token.
//!
//! A plain `Arc<AtomicBool>` plus a `Notify` is sufficient here — no new
//! crate (e.g. `tokio_util`) is pulled in just for this, keeping the
//! dependency surface aligned with what the rest of the workspace
//! already uses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel()` has been called. A node mid-execution
    /// can `tokio::select!` against this to stop cooperatively rather
    /// than being forcibly killed.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_immediately_once_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(50), token.cancelled())
            .await
            .expect("cancelled() should not block once already cancelled");
    }

    #[tokio::test]
    async fn cancelled_resolves_when_cancel_is_called_concurrently() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(50), handle).await.expect("cancelled() should resolve once cancel() is called").unwrap();
    }
}
