//! `ContractRpc` backed by an alloy client and one contract artifact.

use std::time::Duration;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::Address;
use async_trait::async_trait;

use crate::blockchain::artifact::ContractArtifact;
use crate::blockchain::client::BlockchainClient;
use crate::blockchain::transaction::{
    call_request, deploy_request, send_request, wait_for_confirmation,
};
use crate::session::{ContractRpc, PendingTx, ProviderError, TxReceipt};

/// Deploys and drives a single contract artifact over JSON-RPC.
#[derive(Debug, Clone)]
pub struct AlloyContractRpc {
    client: BlockchainClient,
    artifact: ContractArtifact,
    poll_interval: Duration,
    confirmation_timeout: Option<Duration>,
}

impl AlloyContractRpc {
    pub fn new(client: BlockchainClient, artifact: ContractArtifact) -> Self {
        let poll_interval = client.config().poll_interval();
        let confirmation_timeout = client.config().confirmation_timeout();
        Self {
            client,
            artifact,
            poll_interval,
            confirmation_timeout,
        }
    }
}

#[async_trait]
impl ContractRpc for AlloyContractRpc {
    async fn deploy(&self, args: &[DynSolValue], from: Address) -> Result<PendingTx, ProviderError> {
        let code = self.artifact.encode_deploy(args)?;
        let tx_hash = self.client.send_transaction(deploy_request(from, code)).await?;
        tracing::debug!(tx_hash = %tx_hash, from = %from, "Deployment transaction sent");
        Ok(PendingTx {
            tx_hash,
            contract_address: None,
        })
    }

    async fn call(
        &self,
        contract: Address,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<DynSolValue, ProviderError> {
        let input = self.artifact.encode_call(method, args)?;
        let output = self.client.call(call_request(contract, input)).await?;
        Ok(self.artifact.decode_output(method, &output)?)
    }

    async fn send(
        &self,
        contract: Address,
        method: &str,
        args: &[DynSolValue],
        from: Address,
    ) -> Result<PendingTx, ProviderError> {
        let input = self.artifact.encode_call(method, args)?;
        let tx_hash = self
            .client
            .send_transaction(send_request(from, contract, input))
            .await?;
        tracing::debug!(tx_hash = %tx_hash, method, "Transaction sent");
        Ok(PendingTx {
            tx_hash,
            contract_address: None,
        })
    }

    async fn confirm(&self, tx: &PendingTx) -> Result<TxReceipt, ProviderError> {
        let receipt = wait_for_confirmation(
            &self.client,
            tx.tx_hash,
            self.poll_interval,
            self.confirmation_timeout,
        )
        .await?;

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            contract_address: receipt.contract_address,
            success: receipt.status(),
        })
    }
}
