//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_connection_transitions_total` (counter): by `status`
//! - `wallet_connection_active` (gauge): 1 while a wallet is active
//! - `wallet_balance_fetches_total` (counter): by `outcome`
//! - `wallet_balance_stale_discards_total` (counter): fetch results dropped by generation check
//! - `contract_deployments_total` (counter): by `outcome`
//! - `contract_transactions_total` (counter): by `kind` (read, write) and `outcome`

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    metrics::describe_counter!(
        "wallet_connection_transitions_total",
        "Connection state transitions by resulting status"
    );
    metrics::describe_gauge!("wallet_connection_active", "1 while a wallet account is active");
    metrics::describe_counter!("wallet_balance_fetches_total", "Applied balance fetches by outcome");
    metrics::describe_counter!(
        "wallet_balance_stale_discards_total",
        "Balance results discarded because the subscription moved on"
    );
    metrics::describe_counter!("contract_deployments_total", "Settled deployments by outcome");
    metrics::describe_counter!("contract_transactions_total", "Contract calls by kind and outcome");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_status(status: &str) {
    metrics::counter!("wallet_connection_transitions_total", "status" => status.to_string())
        .increment(1);
    let active = if status == "active" { 1.0 } else { 0.0 };
    metrics::gauge!("wallet_connection_active").set(active);
}

pub fn record_balance_fetch(outcome: &'static str) {
    metrics::counter!("wallet_balance_fetches_total", "outcome" => outcome).increment(1);
}

pub fn record_stale_discard() {
    metrics::counter!("wallet_balance_stale_discards_total").increment(1);
}

pub fn record_deployment(outcome: &'static str) {
    metrics::counter!("contract_deployments_total", "outcome" => outcome).increment(1);
}

pub fn record_transaction(kind: &'static str, outcome: &'static str) {
    metrics::counter!("contract_transactions_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}
