//! Connection manager.
//!
//! # Responsibilities
//! - Activate / deactivate access to the injected provider
//! - Silent eager reconnect on startup
//! - React to provider-level account, chain and disconnect events
//!
//! # Invariants
//! - Only this module mutates [`ConnectionState`] or registers provider-level listeners
//! - At most one activation is in flight; concurrent callers await its outcome
//! - An activation that resolves after a deactivation (epoch bump) is discarded

use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use crate::observability::metrics;
use crate::session::error::{ProviderError, SessionError};
use crate::session::inflight::InFlight;
use crate::session::listener::ListenerGuard;
use crate::session::lock;
use crate::session::provider::{ProviderEvent, WalletProvider};
use crate::session::sink::Publisher;
use crate::session::state::ConnectionState;

/// Component that reacts to every connection transition.
///
/// Called synchronously, in transition order, while the connection is locked.
pub trait ConnectionObserver: Send + Sync {
    fn on_connection_changed(&self, state: &ConnectionState);
}

/// Owns the activation lifecycle against one provider handle.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Option<Arc<dyn WalletProvider>>,
    shared: Mutex<Shared>,
    observers: Vec<Arc<dyn ConnectionObserver>>,
    publisher: Arc<Publisher>,
    changes: watch::Sender<ConnectionState>,
}

/// How an activation obtains its accounts.
enum Access {
    /// Ask the provider, which may prompt the user.
    Request,
    /// Only accounts the provider already authorized.
    Reuse,
    /// Accounts an eager probe already returned.
    Granted(Vec<Address>),
}

struct Shared {
    state: ConnectionState,
    /// Bumped whenever a pending activation must no longer apply.
    epoch: u64,
    activation: Option<InFlight<ConnectionState>>,
    listener: Option<ListenerGuard>,
}

impl ConnectionManager {
    pub(crate) fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        observers: Vec<Arc<dyn ConnectionObserver>>,
        publisher: Arc<Publisher>,
    ) -> Self {
        let (changes, _) = watch::channel(ConnectionState::disconnected());
        Self {
            inner: Arc::new(Inner {
                provider,
                shared: Mutex::new(Shared {
                    state: ConnectionState::disconnected(),
                    epoch: 0,
                    activation: None,
                    listener: None,
                }),
                observers,
                publisher,
                changes,
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Observe every transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.changes.subscribe()
    }

    /// Whether provider-level listeners are currently registered.
    pub fn has_listener(&self) -> bool {
        lock(&self.inner.shared).listener.is_some()
    }

    /// Request access to the provider.
    ///
    /// `explicit` asks the provider for accounts (may prompt the user); otherwise
    /// only already-authorized accounts are used. Failures end in an `Error`
    /// state rather than an `Err`. Idempotent while active.
    pub async fn activate(&self, explicit: bool) -> ConnectionState {
        let access = if explicit { Access::Request } else { Access::Reuse };
        self.inner.activate(access).await
    }

    /// Reconnect without prompting if the provider already granted access.
    ///
    /// Returns false, with no state change, when it has not.
    pub async fn eager_connect(&self) -> bool {
        let Some(provider) = self.inner.provider.clone() else {
            tracing::debug!("Eager connect skipped: no provider");
            return false;
        };

        match provider.eager_accounts().await {
            Ok(accounts) if !accounts.is_empty() => {
                self.inner.activate(Access::Granted(accounts)).await.is_active()
            }
            Ok(_) => {
                tracing::debug!("Eager connect: provider has no authorized accounts");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "Eager connect probe failed");
                false
            }
        }
    }

    /// Unregister listeners and return to `Disconnected`.
    pub fn deactivate(&self) {
        self.inner.deactivate();
    }
}

impl Inner {
    fn state(&self) -> ConnectionState {
        lock(&self.shared).state.clone()
    }

    async fn activate(self: &Arc<Self>, access: Access) -> ConnectionState {
        let activation = {
            let mut shared = lock(&self.shared);
            if shared.state.is_active() {
                return shared.state.clone();
            }

            match &shared.activation {
                Some(pending) => pending.clone(),
                None => {
                    let Some(provider) = self.provider.clone() else {
                        let failed = ConnectionState::failed(SessionError::NoProviderAvailable);
                        self.transition(&mut shared, failed.clone());
                        tracing::warn!("Activation failed: no wallet provider available");
                        return failed;
                    };

                    let epoch = shared.epoch;
                    self.transition(&mut shared, ConnectionState::activating(provider.clone()));

                    let inner = Arc::clone(self);
                    let pending = InFlight::spawn(async move {
                        inner.run_activation(provider, access, epoch).await
                    });
                    shared.activation = Some(pending.clone());
                    pending
                }
            }
        };

        match activation.wait().await {
            Some(state) => state,
            None => self.state(),
        }
    }

    async fn run_activation(
        self: Arc<Self>,
        provider: Arc<dyn WalletProvider>,
        access: Access,
        epoch: u64,
    ) -> ConnectionState {
        let explicit = matches!(access, Access::Request);
        let accounts = match access {
            Access::Request => provider.request_accounts().await,
            Access::Reuse => provider.eager_accounts().await,
            Access::Granted(accounts) => Ok(accounts),
        };

        let next = match accounts {
            Ok(accounts) => match accounts.first().copied() {
                Some(account) => {
                    let chain_id = self.query_chain_id(provider.as_ref()).await;
                    ConnectionState::active(provider.clone(), account, chain_id)
                }
                None if explicit => ConnectionState::failed(SessionError::AuthorizationRejected(
                    "provider returned no accounts".to_string(),
                )),
                None => ConnectionState::disconnected(),
            },
            Err(ProviderError::Unavailable(reason)) => {
                tracing::warn!(reason = %reason, "Provider unavailable during activation");
                ConnectionState::failed(SessionError::NoProviderAvailable)
            }
            Err(e) => ConnectionState::failed(SessionError::AuthorizationRejected(e.to_string())),
        };

        let mut shared = lock(&self.shared);
        if shared.epoch != epoch {
            tracing::debug!("Discarding activation result superseded by a newer transition");
            return shared.state.clone();
        }
        shared.activation = None;

        if let Some(account) = next.account {
            self.ensure_listener(&mut shared, provider.as_ref());
            self.transition(&mut shared, next.clone());
            self.publisher.activated(account);
            tracing::info!(account = %account, chain_id = ?next.chain_id, explicit, "Wallet activated");
        } else {
            if let Some(error) = &next.error {
                tracing::warn!(error = %error, explicit, "Wallet activation failed");
            }
            self.transition(&mut shared, next.clone());
        }
        next
    }

    async fn query_chain_id(&self, provider: &dyn WalletProvider) -> Option<u64> {
        match provider.chain_id().await {
            Ok(chain_id) => Some(chain_id),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read chain id");
                None
            }
        }
    }

    fn deactivate(&self) {
        let mut shared = lock(&self.shared);
        shared.epoch += 1;
        shared.activation = None;
        shared.listener = None;
        self.transition(&mut shared, ConnectionState::disconnected());
        tracing::info!("Wallet deactivated");
    }

    /// Register the provider event listener unless one is already running.
    fn ensure_listener(self: &Arc<Self>, shared: &mut Shared, provider: &dyn WalletProvider) {
        if shared.listener.as_ref().is_some_and(|l| !l.is_finished()) {
            return;
        }

        let mut events = provider.events();
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.handle_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Provider event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        shared.listener = Some(ListenerGuard::new("provider-events", handle));
    }

    async fn handle_event(self: Arc<Self>, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first().copied() {
                Some(account) => self.adopt_account(account).await,
                None => {
                    tracing::info!("Provider revoked account access");
                    self.deactivate();
                }
            },
            ProviderEvent::ChainChanged(chain_id) => {
                tracing::info!(chain_id, "Provider switched chain, re-activating");
                self.reset_binding();
                self.activate(Access::Reuse).await;
            }
            ProviderEvent::Disconnect => {
                tracing::warn!("Provider disconnected");
                self.deactivate();
            }
        }
    }

    /// Switch to an account the provider reported as authorized. Never prompts.
    async fn adopt_account(&self, account: Address) {
        let Some(provider) = self.provider.clone() else { return };

        let (current, epoch) = {
            let shared = lock(&self.shared);
            (shared.state.clone(), shared.epoch)
        };

        if current.is_active() && current.account == Some(account) {
            let mut shared = lock(&self.shared);
            let same = shared.state.clone();
            self.transition(&mut shared, same);
            tracing::debug!(account = %account, "Account re-confirmed by provider");
            return;
        }

        let chain_id = match current.chain_id {
            Some(chain_id) if current.is_active() => Some(chain_id),
            _ => self.query_chain_id(provider.as_ref()).await,
        };

        let mut shared = lock(&self.shared);
        if shared.epoch != epoch {
            return;
        }
        shared.epoch += 1;
        shared.activation = None;
        self.transition(&mut shared, ConnectionState::active(provider, account, chain_id));
        self.publisher.activated(account);
        tracing::info!(account = %account, "Active account changed");
    }

    /// Drop the current binding but keep the provider listener alive.
    fn reset_binding(&self) {
        let mut shared = lock(&self.shared);
        shared.epoch += 1;
        shared.activation = None;
        self.transition(&mut shared, ConnectionState::disconnected());
    }

    fn transition(&self, shared: &mut Shared, next: ConnectionState) {
        shared.state = next;
        let state = &shared.state;

        for observer in &self.observers {
            observer.on_connection_changed(state);
        }
        self.publisher.update(|snapshot| {
            snapshot.connection_status = state.status;
            snapshot.account = state.account;
            snapshot.chain_id = state.chain_id;
        });
        self.changes.send_replace(state.clone());
        metrics::record_connection_status(&state.status.to_string());
    }
}
