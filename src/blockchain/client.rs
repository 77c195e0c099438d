//! Blockchain RPC client with failover and optional timeouts.
//!
//! # Responsibilities
//! - Connect to the primary JSON-RPC endpoint (signing, if a wallet is loaded)
//!   and any read-only failover endpoints
//! - Query chain state (chain id, block number, balances, receipts, calls)
//! - Submit transactions through the primary endpoint only
//!
//! A JSON-RPC error response means the node answered, so it is returned at
//! once. Transport failures and timeouts move on to the next endpoint.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::TransportResult;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId};
use crate::blockchain::wallet::Wallet;

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Blockchain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// Primary first, then failovers.
    providers: Vec<DynProvider>,
    config: BlockchainConfig,
    rpc_timeout: Option<Duration>,
}

impl BlockchainClient {
    /// Create a new blockchain client.
    ///
    /// Succeeds even when the endpoint is unreachable; a chain id mismatch is
    /// logged, never fatal.
    pub async fn new(config: BlockchainConfig, wallet: Option<&Wallet>) -> BlockchainResult<Self> {
        let mut providers: Vec<DynProvider> = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        match wallet {
            Some(wallet) => providers.push(Arc::new(
                ProviderBuilder::new()
                    .wallet(wallet.ethereum_wallet())
                    .connect_http(primary_url),
            )),
            None => providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url))),
        }

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url)));
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            rpc_timeout: config.rpc_timeout(),
            config,
        };

        match client.verify_chain_id().await {
            Ok(chain_id) => {
                tracing::info!(
                    rpc_url = %client.config.rpc_url,
                    chain_id = chain_id.0,
                    failovers = client.providers.len() - 1,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Query the chain id and compare it with the configured one, if any.
    pub async fn verify_chain_id(&self) -> BlockchainResult<ChainId> {
        let chain_id = self.get_chain_id().await?;
        match self.config.chain_id {
            Some(expected) if expected != chain_id.0 => Err(BlockchainError::ChainMismatch {
                expected,
                actual: chain_id.0,
            }),
            _ => Ok(chain_id),
        }
    }

    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.with_failover("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.with_failover("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    pub async fn get_balance(&self, address: Address) -> BlockchainResult<U256> {
        self.with_failover("eth_getBalance", move |p| async move {
            p.get_balance(address).await
        })
        .await
    }

    /// Accounts unlocked on the primary node.
    pub async fn get_accounts(&self) -> BlockchainResult<Vec<Address>> {
        self.on_primary("eth_accounts", |p| async move { p.get_accounts().await })
            .await
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<TransactionReceipt>> {
        self.with_failover("eth_getTransactionReceipt", move |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// Execute a read-only call against the latest block.
    pub async fn call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        self.with_failover("eth_call", move |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    /// Submit a transaction through the primary endpoint. Returns its hash.
    pub async fn send_transaction(&self, tx: TransactionRequest) -> BlockchainResult<TxHash> {
        self.on_primary("eth_sendTransaction", move |p| async move {
            p.send_transaction(tx)
                .await
                .map(|pending| *pending.tx_hash())
        })
        .await
    }

    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    pub fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }

    async fn on_primary<T, F, Fut>(&self, method: &'static str, call: F) -> BlockchainResult<T>
    where
        F: FnOnce(DynProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let primary = self.providers[0].clone();
        match self.bounded(call(primary)).await {
            Some(Ok(result)) => Ok(result),
            Some(Err(e)) => match e.as_error_resp() {
                Some(payload) => Err(BlockchainError::Rpc(payload.message.to_string())),
                None => Err(BlockchainError::NotAvailable(format!("{}: {}", method, e))),
            },
            None => Err(self.timeout_error()),
        }
    }

    async fn with_failover<T, F, Fut>(&self, method: &'static str, call: F) -> BlockchainResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match self.bounded(call(provider.clone())).await {
                Some(Ok(result)) => return Ok(result),
                Some(Err(e)) => {
                    if let Some(payload) = e.as_error_resp() {
                        return Err(BlockchainError::Rpc(payload.message.to_string()));
                    }
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider");
                }
                None => {
                    tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider");
                }
            }
        }
        Err(BlockchainError::NotAvailable(format!(
            "all RPC providers failed for {}",
            method
        )))
    }

    /// Apply the per-call timeout, if configured. `None` means it elapsed.
    async fn bounded<F: Future>(&self, fut: F) -> Option<F::Output> {
        match self.rpc_timeout {
            Some(limit) => timeout(limit, fut).await.ok(),
            None => Some(fut.await),
        }
    }

    fn timeout_error(&self) -> BlockchainError {
        BlockchainError::Timeout(self.rpc_timeout.map(|d| d.as_secs()).unwrap_or_default())
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("providers", &self.providers.len())
            .field("chain_id", &self.config.chain_id)
            .field("rpc_timeout", &self.rpc_timeout)
            .finish()
    }
}
