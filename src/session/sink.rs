//! Snapshot publication to the surrounding UI layer.

use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use tokio::sync::watch;

use crate::session::lock;
use crate::session::state::SessionSnapshot;

/// Receiver of session state, injected at construction.
///
/// Called synchronously while component state is locked; implementations must
/// not call back into the session.
pub trait SessionSink: Send + Sync {
    /// Latest flat snapshot, delivered on every change.
    fn publish(&self, snapshot: &SessionSnapshot);

    /// Hook fired once per successful activation.
    fn on_activated(&self, _account: Address) {}
}

/// Sink backed by a `watch` channel.
pub struct WatchSink {
    tx: watch::Sender<SessionSnapshot>,
}

impl WatchSink {
    pub fn new() -> (Self, watch::Receiver<SessionSnapshot>) {
        let (tx, rx) = watch::channel(SessionSnapshot::default());
        (Self { tx }, rx)
    }

    /// Attach another receiver.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }
}

impl SessionSink for WatchSink {
    fn publish(&self, snapshot: &SessionSnapshot) {
        self.tx.send_if_modified(|current| {
            if current == snapshot {
                return false;
            }
            *current = snapshot.clone();
            true
        });
    }
}

/// Shared snapshot each component writes its own fields into.
pub(crate) struct Publisher {
    snapshot: Mutex<SessionSnapshot>,
    sink: Arc<dyn SessionSink>,
}

impl Publisher {
    pub(crate) fn new(sink: Arc<dyn SessionSink>) -> Self {
        Self {
            snapshot: Mutex::new(SessionSnapshot::default()),
            sink,
        }
    }

    pub(crate) fn update(&self, apply: impl FnOnce(&mut SessionSnapshot)) {
        let mut snapshot = lock(&self.snapshot);
        apply(&mut snapshot);
        self.sink.publish(&snapshot);
    }

    pub(crate) fn activated(&self, account: Address) {
        self.sink.on_activated(account);
    }

    pub(crate) fn current(&self) -> SessionSnapshot {
        lock(&self.snapshot).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::DeploymentStatus;

    #[test]
    fn test_watch_sink_skips_identical_snapshots() {
        let (sink, mut rx) = WatchSink::new();
        let publisher = Publisher::new(Arc::new(sink));

        publisher.update(|_| {});
        assert!(!rx.has_changed().unwrap());

        publisher.update(|s| s.deployment_status = DeploymentStatus::Deploying);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().deployment_status, DeploymentStatus::Deploying);
    }
}
