//! One spawned operation, any number of awaiting callers.

use std::future::Future;

use tokio::sync::watch;

/// Handle to an operation running on its own task.
///
/// The outcome is broadcast through a `watch` channel so every caller sees the
/// same value, and a caller that stops waiting never cancels the operation.
pub(crate) struct InFlight<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn spawn<F>(operation: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            let outcome = operation.await;
            let _ = tx.send(Some(outcome));
        });
        Self { rx }
    }

    /// Wait for the outcome. `None` if the task died without reporting.
    pub(crate) async fn wait(&self) -> Option<T> {
        let mut rx = self.rx.clone();
        let outcome = rx.wait_for(Option::is_some).await.ok()?;
        outcome.clone()
    }
}

impl<T> Clone for InFlight<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_callers_share_one_run() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let op = InFlight::spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            42u32
        });

        let other = op.clone();
        let (a, b) = tokio::join!(op.wait(), other.wait());
        assert_eq!(a, Some(42));
        assert_eq!(b, Some(42));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
