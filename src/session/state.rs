//! Session data model.

use std::fmt;
use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::Address;
use serde::Serialize;

use crate::session::error::SessionError;
use crate::session::provider::WalletProvider;

/// Connection phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Activating,
    Active,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Activating => "activating",
            ConnectionStatus::Active => "active",
            ConnectionStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Connection owned by the connection manager.
///
/// `account` is present iff `status` is [`ConnectionStatus::Active`]; the
/// constructors below are the only way the manager builds a state.
#[derive(Clone, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub provider: Option<Arc<dyn WalletProvider>>,
    pub error: Option<SessionError>,
}

impl ConnectionState {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn activating(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            status: ConnectionStatus::Activating,
            provider: Some(provider),
            ..Self::default()
        }
    }

    pub fn active(provider: Arc<dyn WalletProvider>, account: Address, chain_id: Option<u64>) -> Self {
        Self {
            status: ConnectionStatus::Active,
            account: Some(account),
            chain_id,
            provider: Some(provider),
            error: None,
        }
    }

    pub fn failed(error: SessionError) -> Self {
        Self {
            status: ConnectionStatus::Error,
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ConnectionStatus::Active
    }

    /// Account and provider, only while active.
    pub fn binding(&self) -> Option<(Address, Arc<dyn WalletProvider>)> {
        match (self.status, self.account, &self.provider) {
            (ConnectionStatus::Active, Some(account), Some(provider)) => {
                Some((account, provider.clone()))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("status", &self.status)
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .field("has_provider", &self.provider.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// Deployment phase. Moves forward only; reset only by invalidation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    #[default]
    NotDeployed,
    Deploying,
    Deployed,
    Failed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentStatus::NotDeployed => "not deployed",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Deployed => "deployed",
            DeploymentStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The one contract instance of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractDeployment {
    pub status: DeploymentStatus,
    pub address: Option<Address>,
    pub cached_greeting: Option<String>,
    pub error: Option<SessionError>,
}

/// Kind of contract interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Read,
    Write,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Read => "read",
            TransactionKind::Write => "write",
        }
    }
}

/// Input of a single read or write invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    pub kind: TransactionKind,
    pub method: String,
    pub args: Vec<DynSolValue>,
}

impl TransactionRequest {
    pub fn read(method: impl Into<String>) -> Self {
        Self {
            kind: TransactionKind::Read,
            method: method.into(),
            args: Vec::new(),
        }
    }

    pub fn write(method: impl Into<String>, args: Vec<DynSolValue>) -> Self {
        Self {
            kind: TransactionKind::Write,
            method: method.into(),
            args,
        }
    }
}

/// Flat, read-only view published to the UI layer on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub connection_status: ConnectionStatus,
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub balance_display: Option<String>,
    pub deployment_status: DeploymentStatus,
    pub contract_address: Option<Address>,
    pub cached_greeting: Option<String>,
    pub write_processing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_only_when_active() {
        let state = ConnectionState::failed(SessionError::NoProviderAvailable);
        assert_eq!(state.status, ConnectionStatus::Error);
        assert!(state.account.is_none());
        assert!(state.binding().is_none());

        let state = ConnectionState::disconnected();
        assert!(!state.is_active());
        assert!(state.account.is_none());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = SessionSnapshot {
            connection_status: ConnectionStatus::Active,
            deployment_status: DeploymentStatus::NotDeployed,
            write_processing: true,
            ..SessionSnapshot::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["connectionStatus"], "active");
        assert_eq!(json["deploymentStatus"], "not_deployed");
        assert_eq!(json["writeProcessing"], true);
        assert!(json["contractAddress"].is_null());
    }
}
