use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Cooperative stop signal shared by the submitter and the monitor.
///
/// Stopping halts new submissions and polling promptly; it does not rewrite
/// job state, so every job is left at its last consistent snapshot.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake every waiter.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Wait until a stop is requested. Returns immediately if one already
    /// was.
    pub async fn cancelled(&self) {
        if self.is_stopped() {
            return;
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register interest before the re-check so a stop landing in
        // between is not missed.
        notified.as_mut().enable();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_stopped() {
        let signal = StopSignal::new();
        signal.stop();
        tokio::time::timeout(Duration::from_millis(50), signal.cancelled())
            .await
            .expect("cancelled() should not block after stop()");
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.stop();
        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .expect("waiter should wake after stop()")
            .unwrap();
    }
}
