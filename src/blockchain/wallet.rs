//! Local signing key.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// A private-key signer that owns exactly one account.
#[derive(Debug, Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> BlockchainResult<Self> {
        let key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(address = %signer.address(), "Wallet initialized");
        Ok(Self { signer })
    }

    /// Load a wallet from the named environment variable.
    ///
    /// Returns `Ok(None)` when the variable is unset, so the caller can fall
    /// back to accounts managed by the node.
    pub fn from_env(var: &str) -> BlockchainResult<Option<Self>> {
        match std::env::var(var) {
            Ok(key) => Self::from_private_key(&key).map(Some),
            Err(std::env::VarError::NotPresent) => {
                tracing::debug!(var, "No private key in environment, using node accounts");
                Ok(None)
            }
            Err(e) => Err(BlockchainError::Wallet(format!("Cannot read {}: {}", var, e))),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Signing wallet for an alloy provider.
    pub fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test private key (Anvil / Hardhat first account)
    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_wallet_with_0x_prefix() {
        let wallet = Wallet::from_private_key(&format!("0x{}\n", TEST_PRIVATE_KEY)).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = Wallet::from_private_key("invalid_key");
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[test]
    fn test_unset_env_is_not_an_error() {
        let result = Wallet::from_env("WALLET_SYNC_TEST_KEY_THAT_IS_NEVER_SET");
        assert!(matches!(result, Ok(None)));
    }
}
