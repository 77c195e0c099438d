//! Wallet connection and synchronization layer.
//!
//! Keeps a browser-style wallet session coherent: which account is active,
//! what its balance is at the latest block, and whether the session's one
//! contract instance is deployed, with stale asynchronous results discarded.

pub mod blockchain;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod session;

pub use config::schema::AppConfig;
pub use lifecycle::Shutdown;
pub use session::{Session, SessionError, SessionSink, SessionSnapshot, WatchSink};
