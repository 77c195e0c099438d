//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → provider poll loops exit → session torn down → process exits
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
