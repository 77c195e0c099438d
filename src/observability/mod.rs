//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! session components produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via `metrics`)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Session id is attached as a span field, not threaded through calls
//! - Metric updates are no-ops until a recorder is installed, so library
//!   users and tests pay nothing for them

pub mod logging;
pub mod metrics;
