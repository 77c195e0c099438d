//! Balance synchronizer.
//!
//! # Data Flow
//! ```text
//! connection change ──▶ generation += 1, drop block listener, clear value
//!                       └─ if active: fetch now + listen for blocks (captures generation)
//! new block ──────────▶ spawn fetch(generation)
//! fetch resolves ─────▶ apply only if generation is still current
//! ```
//!
//! Fetches are independent tasks, so completions can arrive out of block
//! order. The generation check is what keeps an obsolete result from
//! overwriting newer state.

use std::sync::{Arc, Mutex, Weak};

use alloy::primitives::{Address, U256};
use tokio::sync::broadcast::error::RecvError;

use crate::observability::metrics;
use crate::session::connection::ConnectionObserver;
use crate::session::error::SessionError;
use crate::session::format::format_balance;
use crate::session::listener::ListenerGuard;
use crate::session::lock;
use crate::session::provider::WalletProvider;
use crate::session::sink::Publisher;
use crate::session::state::ConnectionState;

/// Keeps the active account's balance in step with new blocks.
#[derive(Clone)]
pub struct BalanceSynchronizer {
    inner: Arc<Inner>,
}

struct Inner {
    subscription: Mutex<BalanceSubscription>,
    publisher: Arc<Publisher>,
}

#[derive(Default)]
struct BalanceSubscription {
    account: Option<Address>,
    generation: u64,
    latest: Option<U256>,
    listener: Option<ListenerGuard>,
}

impl BalanceSynchronizer {
    pub(crate) fn new(publisher: Arc<Publisher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscription: Mutex::new(BalanceSubscription::default()),
                publisher,
            }),
        }
    }

    /// Latest applied balance in wei.
    pub fn latest(&self) -> Option<U256> {
        lock(&self.inner.subscription).latest
    }

    /// Account the subscription follows, if any.
    pub fn account(&self) -> Option<Address> {
        lock(&self.inner.subscription).account
    }

    /// Current subscription generation.
    pub fn generation(&self) -> u64 {
        lock(&self.inner.subscription).generation
    }

    /// Whether a block listener is registered.
    pub fn is_subscribed(&self) -> bool {
        lock(&self.inner.subscription).listener.is_some()
    }

    /// Re-subscribe for a new connection state.
    ///
    /// Must be called from within a Tokio runtime when `state` is active.
    pub fn on_connection_changed(&self, state: &ConnectionState) {
        let mut sub = lock(&self.inner.subscription);
        let generation = self.inner.invalidate(&mut sub);

        let Some((account, provider)) = state.binding() else {
            return;
        };
        sub.account = Some(account);

        tokio::spawn(fetch(self.inner.clone(), provider.clone(), account, generation));

        let mut blocks = provider.blocks();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                match blocks.recv().await {
                    Ok(block) => {
                        tracing::trace!(block, generation, "New block, refreshing balance");
                        if !spawn_fetch(&weak, &provider, account, generation) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Block listener lagged, refreshing balance");
                        if !spawn_fetch(&weak, &provider, account, generation) {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        sub.listener = Some(ListenerGuard::new("balance-blocks", handle));
        tracing::debug!(account = %account, generation, "Balance subscription started");
    }

    /// Unsubscribe, orphan outstanding fetches and clear the value.
    pub fn teardown(&self) {
        let mut sub = lock(&self.inner.subscription);
        let generation = self.inner.invalidate(&mut sub);
        tracing::debug!(generation, "Balance subscription torn down");
    }
}

impl ConnectionObserver for BalanceSynchronizer {
    fn on_connection_changed(&self, state: &ConnectionState) {
        BalanceSynchronizer::on_connection_changed(self, state);
    }
}

impl Inner {
    /// Bump the generation and reset the subscription. Returns the new generation.
    fn invalidate(&self, sub: &mut BalanceSubscription) -> u64 {
        sub.generation += 1;
        sub.listener = None;
        sub.account = None;
        sub.latest = None;
        self.publisher.update(|snapshot| snapshot.balance_display = None);
        sub.generation
    }

    fn apply(&self, generation: u64, account: Address, result: Result<U256, SessionError>) {
        let mut sub = lock(&self.subscription);
        if sub.generation != generation {
            tracing::debug!(
                generation,
                current = sub.generation,
                "Discarding stale balance result"
            );
            metrics::record_stale_discard();
            return;
        }

        match result {
            Ok(balance) => {
                sub.latest = Some(balance);
                let display = format_balance(balance);
                self.publisher
                    .update(|snapshot| snapshot.balance_display = Some(display));
                metrics::record_balance_fetch("ok");
            }
            Err(e) => {
                sub.latest = None;
                self.publisher.update(|snapshot| snapshot.balance_display = None);
                tracing::warn!(account = %account, error = %e, "Balance refresh failed, retrying on next block");
                metrics::record_balance_fetch("error");
            }
        }
    }
}

fn spawn_fetch(
    weak: &Weak<Inner>,
    provider: &Arc<dyn WalletProvider>,
    account: Address,
    generation: u64,
) -> bool {
    let Some(inner) = weak.upgrade() else {
        return false;
    };
    tokio::spawn(fetch(inner, provider.clone(), account, generation));
    true
}

async fn fetch(
    inner: Arc<Inner>,
    provider: Arc<dyn WalletProvider>,
    account: Address,
    generation: u64,
) {
    let result = provider
        .get_balance(account)
        .await
        .map_err(|e| SessionError::BalanceFetchFailed(e.to_string()));
    inner.apply(generation, account, result);
}
