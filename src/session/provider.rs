//! Interfaces the session consumes from the outside world.
//!
//! # Provider Handle
//! An externally owned wallet connection. The session only borrows it through
//! `Arc<dyn WalletProvider>`; registering listeners means subscribing to one of
//! its broadcast channels from inside a task owned by a [`ListenerGuard`].
//!
//! # Contract RPC
//! Deploy/call/send/confirm against one contract artifact. Values cross the
//! boundary as dynamically typed ABI values.
//!
//! [`ListenerGuard`]: crate::session::listener::ListenerGuard

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::session::error::ProviderError;

/// Connectivity notifications emitted by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The set of authorized accounts changed. Empty means access was revoked.
    AccountsChanged(Vec<Address>),
    /// The provider switched to another chain.
    ChainChanged(u64),
    /// The provider lost its connection to the network.
    Disconnect,
}

/// An injected wallet provider.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask for account access. May prompt the user.
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Accounts already authorized, without prompting. Empty if none.
    async fn eager_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Chain the provider is currently connected to.
    async fn chain_id(&self) -> Result<u64, ProviderError>;

    /// Native balance of `account` in the smallest on-chain unit.
    async fn get_balance(&self, account: Address) -> Result<U256, ProviderError>;

    /// Subscribe to account, chain and disconnect notifications.
    fn events(&self) -> broadcast::Receiver<ProviderEvent>;

    /// Subscribe to new block numbers, delivered in arrival order.
    fn blocks(&self) -> broadcast::Receiver<u64>;
}

/// A submitted but not yet confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub tx_hash: TxHash,
    /// Known up front for deployments on some providers.
    pub contract_address: Option<Address>,
}

/// Outcome of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub contract_address: Option<Address>,
    /// False when execution reverted.
    pub success: bool,
}

/// Contract RPC bound to a single contract artifact.
#[async_trait]
pub trait ContractRpc: Send + Sync {
    /// Publish a new contract instance signed by `from`.
    async fn deploy(&self, args: &[DynSolValue], from: Address) -> Result<PendingTx, ProviderError>;

    /// Read-only call. Multiple return values come back as a tuple.
    async fn call(
        &self,
        contract: Address,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<DynSolValue, ProviderError>;

    /// Submit a state-changing transaction signed by `from`.
    async fn send(
        &self,
        contract: Address,
        method: &str,
        args: &[DynSolValue],
        from: Address,
    ) -> Result<PendingTx, ProviderError>;

    /// Wait until the network accepts the transaction.
    async fn confirm(&self, tx: &PendingTx) -> Result<TxReceipt, ProviderError>;
}
