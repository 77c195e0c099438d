//! Scoped listener registration.

use tokio::task::JoinHandle;

/// Owns a spawned listener task and aborts it when dropped.
///
/// Replacing or dropping the guard is the only way to unregister, so every exit
/// path releases the listener.
#[derive(Debug)]
pub struct ListenerGuard {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ListenerGuard {
    pub fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        tracing::debug!(listener = name, "Listener registered");
        Self { name, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!(listener = self.name, "Listener removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let (alive, stopped) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _alive = alive;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let guard = ListenerGuard::new("test", handle);
        assert!(!guard.is_finished());

        drop(guard);
        // The sender is dropped with the aborted task's future.
        assert!(stopped.await.is_err());
    }
}
