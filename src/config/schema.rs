//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// JSON-RPC connection settings.
    pub blockchain: BlockchainConfig,

    /// Signing key source.
    pub wallet: WalletConfig,

    /// Contract artifact and method names.
    pub contract: ContractConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Blockchain connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoints, used for read-only queries.
    pub failover_urls: Vec<String>,

    /// Expected chain ID. Logged as a warning on mismatch, never fatal.
    pub chain_id: Option<u64>,

    /// Per-call RPC timeout. Unset means wait for the node indefinitely.
    pub rpc_timeout_secs: Option<u64>,

    /// Upper bound on waiting for a confirmation. Unset means no bound.
    pub confirmation_timeout_secs: Option<u64>,

    /// Block depth a receipt needs before it counts as confirmed.
    pub confirmation_blocks: u32,

    /// How often the provider polls for blocks, chain and account changes.
    pub poll_interval_ms: u64,
}

impl BlockchainConfig {
    pub fn rpc_timeout(&self) -> Option<Duration> {
        self.rpc_timeout_secs.map(Duration::from_secs)
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: None,
            rpc_timeout_secs: None,
            confirmation_timeout_secs: None,
            confirmation_blocks: 1,
            poll_interval_ms: 1000,
        }
    }
}

/// Signing key configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Environment variable holding a hex private key. When the variable is
    /// unset the node's own unlocked accounts are used.
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "WALLET_SYNC_PRIVATE_KEY".to_string(),
        }
    }
}

/// Contract configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Path to a Hardhat-style artifact (`abi` + `bytecode`).
    pub artifact_path: String,

    /// Constructor arguments, coerced to the ABI parameter types.
    pub constructor_args: Vec<String>,

    /// Read-only method whose value is cached after deploy and after writes.
    pub read_method: String,

    /// State-changing method used by the `greeter --set` command.
    pub write_method: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            artifact_path: "artifacts/contracts/Greeter.sol/Greeter.json".to_string(),
            constructor_args: vec!["Hello, Hardhat!".to_string()],
            read_method: "greet".to_string(),
            write_method: "setGreeting".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
