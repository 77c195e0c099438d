//! JSON-RPC backed wallet provider.
//!
//! # Event Source
//! ```text
//! ticker (poll_interval) ──▶ eth_blockNumber + eth_chainId + accounts
//!                              │
//!                              ├─ block advanced ──────▶ blocks channel
//!                              ├─ chain id differs ────▶ ChainChanged
//!                              ├─ accounts differ ─────▶ AccountsChanged
//!                              ├─ endpoint lost ───────▶ Disconnect (after DISCONNECT_AFTER failed polls)
//!                              └─ endpoint recovered ──▶ reachability channel = true
//! ```
//! The first successful poll only records a baseline. A `Disconnect` tears the
//! session's listeners down, so recovery is signalled out of band and the
//! owner reconnects with an eager connect.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, MissedTickBehavior};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::session::{ProviderError, ProviderEvent, WalletProvider};

const EVENT_CAPACITY: usize = 16;
const BLOCK_CAPACITY: usize = 64;

/// Consecutive failed polls before the endpoint counts as lost.
const DISCONNECT_AFTER: u32 = 3;

/// Wallet provider over a JSON-RPC node.
///
/// Signs with the local key when one is loaded, otherwise with the node's
/// unlocked accounts.
pub struct RpcWallet {
    client: BlockchainClient,
    signer: Option<Address>,
    events: broadcast::Sender<ProviderEvent>,
    blocks: broadcast::Sender<u64>,
    reachable: watch::Sender<bool>,
}

impl RpcWallet {
    pub fn new(client: BlockchainClient, signer: Option<Address>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (blocks, _) = broadcast::channel(BLOCK_CAPACITY);
        let (reachable, _) = watch::channel(true);
        Self {
            client,
            signer,
            events,
            blocks,
            reachable,
        }
    }

    /// Endpoint reachability as seen by the poller. Flips to `false` together
    /// with the `Disconnect` event and back to `true` once polls succeed again.
    pub fn reachability(&self) -> watch::Receiver<bool> {
        self.reachable.subscribe()
    }

    /// Poll the node until shutdown, publishing block and provider events.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.client.config().poll_interval();
        tracing::info!(interval_ms = interval.as_millis() as u64, "Provider poller starting");

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut view = ChainView::default();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let observation = self.observe().await;
                    self.emit(view.apply(observation));
                }
                _ = shutdown.recv() => {
                    tracing::info!("Provider poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn observe(&self) -> Observation {
        let polled = tokio::try_join!(
            self.client.get_block_number(),
            self.client.get_chain_id(),
            self.accounts(),
        );
        match polled {
            Ok((block, chain_id, accounts)) => Observation::Reachable {
                block,
                chain_id: chain_id.0,
                accounts,
            },
            Err(e) => {
                tracing::debug!(error = %e, "Provider poll failed");
                Observation::Unreachable
            }
        }
    }

    fn emit(&self, changes: Changes) {
        if let Some(block) = changes.block {
            tracing::trace!(block, "New block");
            // No receivers simply means nobody is subscribed yet.
            let _ = self.blocks.send(block);
        }
        for event in changes.events {
            tracing::debug!(event = ?event, "Provider event");
            let _ = self.events.send(event);
        }
        if changes.lost {
            tracing::warn!("Provider endpoint lost");
            self.reachable.send_replace(false);
        }
        if changes.recovered {
            tracing::info!("Provider endpoint recovered");
            self.reachable.send_replace(true);
        }
    }

    async fn accounts(&self) -> BlockchainResult<Vec<Address>> {
        match self.signer {
            Some(signer) => Ok(vec![signer]),
            None => self.client.get_accounts().await,
        }
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let accounts = self.accounts().await?;
        if accounts.is_empty() {
            return Err(BlockchainError::Wallet(
                "no private key configured and the node exposes no unlocked accounts".to_string(),
            )
            .into());
        }
        Ok(accounts)
    }

    async fn eager_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(self.accounts().await?)
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.client.get_chain_id().await?.0)
    }

    async fn get_balance(&self, account: Address) -> Result<U256, ProviderError> {
        Ok(self.client.get_balance(account).await?)
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn blocks(&self) -> broadcast::Receiver<u64> {
        self.blocks.subscribe()
    }
}

#[derive(Debug)]
enum Observation {
    Reachable {
        block: u64,
        chain_id: u64,
        accounts: Vec<Address>,
    },
    Unreachable,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Changes {
    block: Option<u64>,
    events: Vec<ProviderEvent>,
    lost: bool,
    recovered: bool,
}

/// Last observed node state.
#[derive(Debug, Default)]
struct ChainView {
    block: Option<u64>,
    chain_id: Option<u64>,
    accounts: Option<Vec<Address>>,
    failures: u32,
    lost: bool,
}

impl ChainView {
    fn apply(&mut self, observation: Observation) -> Changes {
        let mut changes = Changes::default();

        let (block, chain_id, accounts) = match observation {
            Observation::Unreachable => {
                if self.chain_id.is_none() || self.lost {
                    return changes;
                }
                self.failures += 1;
                if self.failures >= DISCONNECT_AFTER {
                    self.lost = true;
                    changes.lost = true;
                    changes.events.push(ProviderEvent::Disconnect);
                }
                return changes;
            }
            Observation::Reachable {
                block,
                chain_id,
                accounts,
            } => (block, chain_id, accounts),
        };

        self.failures = 0;
        if self.lost {
            // Listeners are gone; the owner re-reads everything on reconnect.
            self.lost = false;
            changes.recovered = true;
        } else {
            if self.chain_id.is_some_and(|known| known != chain_id) {
                changes.events.push(ProviderEvent::ChainChanged(chain_id));
            }
            if self.accounts.as_ref().is_some_and(|known| *known != accounts) {
                changes.events.push(ProviderEvent::AccountsChanged(accounts.clone()));
            }
        }

        if self.block.is_some_and(|known| block > known) {
            changes.block = Some(block);
        }

        self.block = Some(block);
        self.chain_id = Some(chain_id);
        self.accounts = Some(accounts);
        changes
    }
}
