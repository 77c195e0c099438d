//! Wallet session: connection, balance and contract lifecycle.
//!
//! # Data Flow
//! ```text
//! WalletProvider (injected, borrowed)
//!     → connection.rs  activate / eager connect / provider events
//!         ├─▶ balance.rs   re-subscribe per transition, per-block refresh
//!         └─▶ contract.rs  rebind signer, invalidate on chain switch
//!
//! every component ──▶ sink.rs Publisher ──▶ SessionSink (UI layer)
//! ```
//!
//! # Concurrency
//! - Component state sits behind short `std::sync::Mutex` sections, never held
//!   across an `.await`; every status or generation check happens there,
//!   before the asynchronous call is issued.
//! - Stale asynchronous results are discarded by generation/epoch comparison,
//!   not by interrupting the call.

pub mod balance;
pub mod connection;
pub mod contract;
pub mod error;
pub mod format;
pub mod listener;
pub mod provider;
pub mod sink;
pub mod state;

mod inflight;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::Instrument;
use uuid::Uuid;

use crate::config::ContractConfig;

pub use balance::BalanceSynchronizer;
pub use connection::{ConnectionManager, ConnectionObserver};
pub use contract::ContractController;
pub use error::{ProviderError, SessionError, SessionResult};
pub use provider::{ContractRpc, PendingTx, ProviderEvent, TxReceipt, WalletProvider};
pub use sink::{SessionSink, WatchSink};
pub use state::{
    ConnectionState, ConnectionStatus, ContractDeployment, DeploymentStatus, SessionSnapshot,
};

/// Lock a component mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One browser-style wallet session.
///
/// Wires the connection manager to the balance synchronizer and the contract
/// controller, all publishing into a single injected sink.
pub struct Session {
    id: Uuid,
    connection: ConnectionManager,
    balance: BalanceSynchronizer,
    contract: ContractController,
    publisher: Arc<sink::Publisher>,
}

impl Session {
    /// Build a session. `provider` is `None` when no wallet was injected.
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        rpc: Arc<dyn ContractRpc>,
        sink: Arc<dyn SessionSink>,
        contract_config: &ContractConfig,
    ) -> Self {
        let id = Uuid::new_v4();
        let publisher = Arc::new(sink::Publisher::new(sink));
        let balance = BalanceSynchronizer::new(publisher.clone());
        let contract = ContractController::new(rpc, contract_config, publisher.clone());
        let observers: Vec<Arc<dyn ConnectionObserver>> =
            vec![Arc::new(balance.clone()), Arc::new(contract.clone())];
        let connection = ConnectionManager::new(provider, observers, publisher.clone());

        tracing::debug!(session_id = %id, "Session created");
        Self {
            id,
            connection,
            balance,
            contract,
            publisher,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn balance(&self) -> &BalanceSynchronizer {
        &self.balance
    }

    pub fn contract(&self) -> &ContractController {
        &self.contract
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.publisher.current()
    }

    /// Startup sequence: silent reconnect if the provider already granted access.
    pub async fn start(&self) -> bool {
        let span = tracing::info_span!("session", id = %self.id);
        let connected = self.connection.eager_connect().instrument(span).await;
        tracing::info!(session_id = %self.id, connected, "Session started");
        connected
    }

    /// Eager connect again unless already active. For owners that learn out
    /// of band that the provider is reachable again after a `Disconnect`.
    pub async fn reconnect(&self) -> bool {
        if self.connection.state().is_active() {
            return true;
        }
        let connected = self.connection.eager_connect().await;
        tracing::info!(session_id = %self.id, connected, "Session reconnect");
        connected
    }

    /// Tear everything down: balance subscription first, then the connection.
    pub fn shutdown(&self) {
        self.balance.teardown();
        self.connection.deactivate();
        tracing::info!(session_id = %self.id, "Session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.balance.teardown();
    }
}
