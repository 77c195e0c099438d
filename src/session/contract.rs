//! Contract lifecycle controller.
//!
//! # State Machine
//! ```text
//! NotDeployed ──deploy──▶ Deploying ──confirmed + initial read──▶ Deployed
//!                              └────────────any failure──────────▶ Failed
//! ```
//! A connection change that drops the account or moves to another chain
//! invalidates the binding: status returns to `NotDeployed` and any deployment
//! still in flight is discarded when it resolves.
//!
//! `processing` is tracked separately from `status`: every write holds a
//! [`ProcessingGuard`] that clears its flag on every exit path.

use std::sync::{Arc, Mutex};

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::Address;

use crate::config::ContractConfig;
use crate::observability::metrics;
use crate::session::connection::ConnectionObserver;
use crate::session::error::{ProviderError, SessionError, SessionResult};
use crate::session::inflight::InFlight;
use crate::session::lock;
use crate::session::provider::ContractRpc;
use crate::session::sink::Publisher;
use crate::session::state::{
    ConnectionState, ContractDeployment, DeploymentStatus, TransactionRequest,
};

type DeployOutcome = SessionResult<Address>;

/// Enforces one deployment per binding and drives reads and confirmed writes.
#[derive(Clone)]
pub struct ContractController {
    inner: Arc<Inner>,
}

struct Inner {
    rpc: Arc<dyn ContractRpc>,
    read_method: String,
    state: Mutex<ControllerState>,
    publisher: Arc<Publisher>,
}

#[derive(Default)]
struct ControllerState {
    deployment: ContractDeployment,
    signer: Option<Address>,
    chain_id: Option<u64>,
    /// Bumped on invalidation; results from an older epoch are dropped.
    epoch: u64,
    pending: Option<InFlight<DeployOutcome>>,
    writes_in_flight: usize,
}

impl ContractController {
    pub(crate) fn new(
        rpc: Arc<dyn ContractRpc>,
        config: &ContractConfig,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                rpc,
                read_method: config.read_method.clone(),
                state: Mutex::new(ControllerState::default()),
                publisher,
            }),
        }
    }

    /// Current deployment record.
    pub fn deployment(&self) -> ContractDeployment {
        lock(&self.inner.state).deployment.clone()
    }

    pub fn status(&self) -> DeploymentStatus {
        lock(&self.inner.state).deployment.status
    }

    /// True while at least one write is between submission and its final read.
    pub fn is_write_processing(&self) -> bool {
        lock(&self.inner.state).writes_in_flight > 0
    }

    /// Deploy the contract, at most once per binding.
    ///
    /// Concurrent callers share the one deployment and observe the same
    /// address or the same failure. Once settled, later calls return the
    /// settled outcome without touching the network.
    pub async fn deploy(&self, args: Vec<DynSolValue>) -> SessionResult<Address> {
        let pending = {
            let mut state = lock(&self.inner.state);
            let joined = match state.deployment.status {
                DeploymentStatus::Deployed => {
                    return state.deployment.address.ok_or_else(|| {
                        SessionError::invalid_state("deploy", "deployed without an address")
                    });
                }
                DeploymentStatus::Failed => {
                    return Err(state.deployment.error.clone().unwrap_or_else(|| {
                        SessionError::DeploymentFailed("previous deployment failed".to_string())
                    }));
                }
                DeploymentStatus::Deploying => state.pending.clone(),
                DeploymentStatus::NotDeployed => None,
            };

            match joined {
                Some(pending) => pending,
                None => {
                    let signer = state
                        .signer
                        .ok_or_else(|| SessionError::invalid_state("deploy", "no active account"))?;
                    let epoch = state.epoch;
                    state.deployment.status = DeploymentStatus::Deploying;
                    state.deployment.error = None;
                    self.inner
                        .publisher
                        .update(|s| s.deployment_status = DeploymentStatus::Deploying);

                    let inner = self.inner.clone();
                    let pending = InFlight::spawn(async move {
                        inner.run_deploy(signer, args, epoch).await
                    });
                    state.pending = Some(pending.clone());
                    tracing::info!(signer = %signer, "Contract deployment started");
                    pending
                }
            }
        };

        pending.wait().await.unwrap_or_else(|| {
            Err(SessionError::DeploymentFailed(
                "deployment task ended without an outcome".to_string(),
            ))
        })
    }

    /// Read-only call against the deployed contract.
    ///
    /// Reading the configured greeting method also refreshes the cached value.
    pub async fn read(&self, method: &str) -> SessionResult<DynSolValue> {
        let request = TransactionRequest::read(method);
        let (address, epoch) = self.inner.require_deployed("read")?;

        let value = self
            .inner
            .rpc
            .call(address, &request.method, &request.args)
            .await
            .map_err(|e| {
                metrics::record_transaction(request.kind.as_str(), "error");
                SessionError::ContractCallFailed(e.to_string())
            })?;
        metrics::record_transaction(request.kind.as_str(), "ok");

        if request.method == self.inner.read_method {
            self.inner.cache_greeting(epoch, &value);
        }
        Ok(value)
    }

    /// Submit a transaction, wait for confirmation, then return the value of
    /// the configured read method.
    ///
    /// On failure the cached greeting is left untouched.
    pub async fn write(&self, method: &str, args: Vec<DynSolValue>) -> SessionResult<DynSolValue> {
        let request = TransactionRequest::write(method, args);
        let (address, epoch) = self.inner.require_deployed("write")?;
        let signer = lock(&self.inner.state)
            .signer
            .ok_or_else(|| SessionError::invalid_state("write", "no active account"))?;

        if request
            .args
            .iter()
            .any(|arg| matches!(arg, DynSolValue::String(s) if s.is_empty()))
        {
            return Err(SessionError::InvalidInput(format!(
                "{} argument cannot be empty",
                request.method
            )));
        }

        let outcome = self.inner.submit(address, signer, epoch, &request).await;
        let label = if outcome.is_ok() { "ok" } else { "error" };
        metrics::record_transaction(request.kind.as_str(), label);
        outcome
    }
}

impl ConnectionObserver for ContractController {
    fn on_connection_changed(&self, connection: &ConnectionState) {
        let mut state = lock(&self.inner.state);

        let rebind = match (connection.is_active(), state.chain_id) {
            (false, _) => true,
            (true, Some(bound)) => connection.chain_id != Some(bound),
            (true, None) => false,
        };
        if rebind && state.deployment.status != DeploymentStatus::NotDeployed {
            self.inner.invalidate(&mut state);
        }

        if connection.is_active() {
            state.signer = connection.account;
            state.chain_id = connection.chain_id;
        } else {
            state.signer = None;
            state.chain_id = None;
        }
    }
}

impl Inner {
    fn require_deployed(&self, operation: &'static str) -> SessionResult<(Address, u64)> {
        let state = lock(&self.state);
        match (state.deployment.status, state.deployment.address) {
            (DeploymentStatus::Deployed, Some(address)) => Ok((address, state.epoch)),
            (status, _) => Err(SessionError::invalid_state(
                operation,
                format!("contract {}", status),
            )),
        }
    }

    async fn run_deploy(
        self: Arc<Self>,
        signer: Address,
        args: Vec<DynSolValue>,
        epoch: u64,
    ) -> DeployOutcome {
        let outcome = self.deploy_and_read(signer, &args).await;

        let mut state = lock(&self.state);
        if state.epoch != epoch {
            tracing::info!("Deployment resolved after the connection changed, discarding");
            return Err(SessionError::invalid_state(
                "deploy",
                "connection changed during deployment",
            ));
        }
        state.pending = None;

        match outcome {
            Ok((address, greeting)) => {
                state.deployment = ContractDeployment {
                    status: DeploymentStatus::Deployed,
                    address: Some(address),
                    cached_greeting: greeting.clone(),
                    error: None,
                };
                self.publisher.update(|s| {
                    s.deployment_status = DeploymentStatus::Deployed;
                    s.contract_address = Some(address);
                    s.cached_greeting = greeting;
                });
                metrics::record_deployment("ok");
                tracing::info!(address = %address, "Contract deployed");
                Ok(address)
            }
            Err(e) => {
                state.deployment.status = DeploymentStatus::Failed;
                state.deployment.error = Some(e.clone());
                self.publisher
                    .update(|s| s.deployment_status = DeploymentStatus::Failed);
                metrics::record_deployment("error");
                tracing::error!(error = %e, "Contract deployment failed");
                Err(e)
            }
        }
    }

    async fn deploy_and_read(
        &self,
        signer: Address,
        args: &[DynSolValue],
    ) -> SessionResult<(Address, Option<String>)> {
        let failed = |e: ProviderError| SessionError::DeploymentFailed(e.to_string());

        let pending = self.rpc.deploy(args, signer).await.map_err(failed)?;
        tracing::debug!(tx_hash = %pending.tx_hash, "Deployment submitted, awaiting confirmation");

        let receipt = self.rpc.confirm(&pending).await.map_err(failed)?;
        if !receipt.success {
            return Err(SessionError::DeploymentFailed(format!(
                "deployment transaction {} reverted",
                receipt.tx_hash
            )));
        }

        let address = receipt
            .contract_address
            .or(pending.contract_address)
            .ok_or_else(|| {
                SessionError::DeploymentFailed("receipt carried no contract address".to_string())
            })?;

        let initial = self
            .rpc
            .call(address, &self.read_method, &[])
            .await
            .map_err(failed)?;
        Ok((address, initial.as_str().map(str::to_owned)))
    }

    async fn submit(
        self: &Arc<Self>,
        address: Address,
        signer: Address,
        epoch: u64,
        request: &TransactionRequest,
    ) -> SessionResult<DynSolValue> {
        let _processing = ProcessingGuard::acquire(self.clone());

        let pending = self
            .rpc
            .send(address, &request.method, &request.args, signer)
            .await
            .map_err(|e| SessionError::TransactionSubmissionFailed(e.to_string()))?;
        tracing::debug!(
            tx_hash = %pending.tx_hash,
            method = %request.method,
            "Transaction submitted, awaiting confirmation"
        );

        let receipt = self
            .rpc
            .confirm(&pending)
            .await
            .map_err(|e| SessionError::TransactionSubmissionFailed(e.to_string()))?;
        if !receipt.success {
            return Err(SessionError::TransactionReversion(format!(
                "{} in transaction {}",
                request.method, receipt.tx_hash
            )));
        }

        let value = self
            .rpc
            .call(address, &self.read_method, &[])
            .await
            .map_err(|e| SessionError::ContractCallFailed(e.to_string()))?;
        self.cache_greeting(epoch, &value);
        tracing::info!(
            tx_hash = %receipt.tx_hash,
            block = ?receipt.block_number,
            method = %request.method,
            "Transaction confirmed"
        );
        Ok(value)
    }

    fn cache_greeting(&self, epoch: u64, value: &DynSolValue) {
        let Some(greeting) = value.as_str() else { return };
        let mut state = lock(&self.state);
        if state.epoch != epoch {
            return;
        }
        state.deployment.cached_greeting = Some(greeting.to_owned());
        self.publisher
            .update(|s| s.cached_greeting = Some(greeting.to_owned()));
    }

    fn invalidate(&self, state: &mut ControllerState) {
        state.epoch += 1;
        state.pending = None;
        state.deployment = ContractDeployment::default();
        self.publisher.update(|s| {
            s.deployment_status = DeploymentStatus::NotDeployed;
            s.contract_address = None;
            s.cached_greeting = None;
        });
        tracing::info!("Contract binding invalidated");
    }
}

/// Marks one write as processing until dropped.
struct ProcessingGuard {
    inner: Arc<Inner>,
}

impl ProcessingGuard {
    fn acquire(inner: Arc<Inner>) -> Self {
        {
            let mut state = lock(&inner.state);
            state.writes_in_flight += 1;
            inner.publisher.update(|s| s.write_processing = true);
        }
        Self { inner }
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.inner.state);
        state.writes_in_flight = state.writes_in_flight.saturating_sub(1);
        let processing = state.writes_in_flight > 0;
        self.inner
            .publisher
            .update(|s| s.write_processing = processing);
    }
}

#[cfg(test)]
mod tests {
    use crate::session::state::TransactionKind;

    #[test]
    fn test_kind_labels() {
        assert_eq!(TransactionKind::Read.as_str(), "read");
        assert_eq!(TransactionKind::Write.as_str(), "write");
    }
}
