//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key) + BlockchainConfig
//!     → wallet.rs (key loading)
//!     → client.rs (JSON-RPC with failover and optional timeouts)
//!     → transaction.rs (request building, confirmation polling)
//!     → provider.rs  RpcWallet       : session::WalletProvider
//!     → contract.rs  AlloyContractRpc: session::ContractRpc (artifact.rs for ABI)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - Graceful degradation when blockchain unreachable

pub mod artifact;
pub mod client;
pub mod contract;
pub mod provider;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use artifact::ContractArtifact;
pub use client::BlockchainClient;
pub use contract::AlloyContractRpc;
pub use provider::RpcWallet;
pub use types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId};
pub use wallet::Wallet;
