//! Transaction request building and confirmation monitoring.
//!
//! # Responsibilities
//! - Build deploy, call and send requests
//! - Poll for the receipt until it has the configured block depth
//!
//! Nonce, gas and chain id are filled by the provider's recommended fillers.

use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationStatus};

/// Contract creation signed by `from`.
pub fn deploy_request(from: Address, code: Bytes) -> TransactionRequest {
    TransactionRequest::default()
        .with_from(from)
        .with_deploy_code(code)
}

/// Read-only call; no sender.
pub fn call_request(to: Address, input: Bytes) -> TransactionRequest {
    TransactionRequest::default().with_to(to).with_input(input)
}

/// State-changing call signed by `from`.
pub fn send_request(from: Address, to: Address, input: Bytes) -> TransactionRequest {
    call_request(to, input).with_from(from)
}

/// Classify a receipt against the current chain head.
pub fn confirmation_status(
    receipt: Option<&TransactionReceipt>,
    current_block: u64,
    required: u32,
) -> ConfirmationStatus {
    let Some(receipt) = receipt else {
        return ConfirmationStatus::Pending;
    };
    if !receipt.status() {
        return ConfirmationStatus::Reverted {
            block_number: receipt.block_number,
        };
    }

    let tx_block = receipt.block_number.unwrap_or(current_block);
    // The inclusion block itself counts as the first confirmation.
    let current = current_block.saturating_sub(tx_block).saturating_add(1);
    let current = u32::try_from(current).unwrap_or(u32::MAX);
    if current >= required {
        ConfirmationStatus::Confirmed {
            block_number: tx_block,
        }
    } else {
        ConfirmationStatus::Confirming { current, required }
    }
}

/// Wait for a transaction to be confirmed or to revert.
///
/// Returns the receipt in both cases; callers check `status()`. Waits
/// indefinitely unless `max_wait` is set.
pub async fn wait_for_confirmation(
    client: &BlockchainClient,
    tx_hash: TxHash,
    poll_interval: Duration,
    max_wait: Option<Duration>,
) -> BlockchainResult<TransactionReceipt> {
    let required = client.confirmation_blocks();

    let poll = async {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let receipt = client.get_transaction_receipt(tx_hash).await?;
            let current_block = match &receipt {
                Some(_) if required > 1 => client.get_block_number().await?,
                Some(r) => r.block_number.unwrap_or_default(),
                None => 0,
            };

            match confirmation_status(receipt.as_ref(), current_block, required) {
                ConfirmationStatus::Pending => {
                    tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                }
                ConfirmationStatus::Confirming { current, required } => {
                    tracing::debug!(
                        tx_hash = %tx_hash,
                        confirmations = current,
                        required,
                        "Waiting for confirmations"
                    );
                }
                ConfirmationStatus::Confirmed { block_number } => {
                    tracing::debug!(tx_hash = %tx_hash, block_number, "Transaction confirmed");
                    return receipt.ok_or_else(|| {
                        BlockchainError::Rpc("receipt vanished while confirming".to_string())
                    });
                }
                ConfirmationStatus::Reverted { block_number } => {
                    tracing::warn!(tx_hash = %tx_hash, block_number = ?block_number, "Transaction reverted");
                    return receipt.ok_or_else(|| {
                        BlockchainError::Rpc("receipt vanished while confirming".to_string())
                    });
                }
            }
        }
    };

    match max_wait {
        Some(limit) => timeout(limit, poll)
            .await
            .map_err(|_| BlockchainError::ConfirmationTimeout(limit.as_secs()))?,
        None => poll.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_without_receipt() {
        assert_eq!(confirmation_status(None, 100, 1), ConfirmationStatus::Pending);
    }

    #[test]
    fn test_requests_carry_sender_and_target() {
        let from = Address::repeat_byte(0x11);
        let to = Address::repeat_byte(0x22);

        let deploy = deploy_request(from, Bytes::from_static(&[0x60, 0x80]));
        assert_eq!(deploy.from, Some(from));
        assert!(deploy.to.is_some_and(|kind| kind.is_create()));

        let send = send_request(from, to, Bytes::from_static(&[0xa4, 0x13]));
        assert_eq!(send.from, Some(from));
        assert_eq!(send.to.and_then(|kind| kind.to().copied()), Some(to));

        let call = call_request(to, Bytes::new());
        assert_eq!(call.from, None);
    }
}
