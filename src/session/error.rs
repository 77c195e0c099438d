//! Session error taxonomy.

use thiserror::Error;

/// Errors surfaced by the connection, balance and contract components.
///
/// Errors are `Clone` because a single coalesced operation (activation,
/// deployment) delivers the same outcome to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No injected wallet provider was handed to the session.
    #[error("No wallet provider available")]
    NoProviderAvailable,

    /// The provider refused to authorize account access.
    #[error("Authorization rejected: {0}")]
    AuthorizationRejected(String),

    /// A single balance query failed. Recovered locally on the next block.
    #[error("Balance fetch failed: {0}")]
    BalanceFetchFailed(String),

    /// Contract deployment failed. Terminal for the current binding.
    #[error("Contract deployment failed: {0}")]
    DeploymentFailed(String),

    /// A state-changing transaction could not be submitted or confirmed.
    #[error("Transaction submission failed: {0}")]
    TransactionSubmissionFailed(String),

    /// The transaction was mined but execution reverted.
    #[error("Transaction reverted: {0}")]
    TransactionReversion(String),

    /// A read-only contract call failed.
    #[error("Contract call failed: {0}")]
    ContractCallFailed(String),

    /// Operation invoked outside the status it is valid in.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Caller-supplied input rejected before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SessionError {
    pub(crate) fn invalid_state(operation: &'static str, state: impl Into<String>) -> Self {
        Self::InvalidState {
            operation,
            state: state.into(),
        }
    }
}

/// Errors reported by a provider or contract RPC implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The user or wallet declined the request.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The provider is unreachable or disconnected.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The RPC call itself failed.
    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
