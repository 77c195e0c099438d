//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Every field has a default so a missing file section is valid
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets are never stored in the file, only the name of the env var holding them

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, BlockchainConfig, ContractConfig, ObservabilityConfig, WalletConfig};
