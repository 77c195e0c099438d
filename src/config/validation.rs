//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let chain = &config.blockchain;

    if let Err(e) = url::Url::parse(&chain.rpc_url) {
        errors.push(ValidationError::new("blockchain.rpc_url", format!("invalid URL: {}", e)));
    }
    for failover in &chain.failover_urls {
        if url::Url::parse(failover).is_err() {
            errors.push(ValidationError::new(
                "blockchain.failover_urls",
                format!("invalid URL '{}'", failover),
            ));
        }
    }
    if chain.poll_interval_ms == 0 {
        errors.push(ValidationError::new("blockchain.poll_interval_ms", "must be greater than 0"));
    }
    if chain.rpc_timeout_secs == Some(0) {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be greater than 0 when set"));
    }
    if chain.confirmation_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "blockchain.confirmation_timeout_secs",
            "must be greater than 0 when set",
        ));
    }

    if config.wallet.private_key_env.trim().is_empty() {
        errors.push(ValidationError::new("wallet.private_key_env", "must not be empty"));
    }

    if config.contract.read_method.trim().is_empty() {
        errors.push(ValidationError::new("contract.read_method", "must not be empty"));
    }
    if config.contract.write_method.trim().is_empty() {
        errors.push(ValidationError::new("contract.write_method", "must not be empty"));
    }

    let obs = &config.observability;
    if !matches!(
        obs.log_level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", obs.log_level),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.blockchain.failover_urls.push("::bad::".to_string());
        config.blockchain.rpc_timeout_secs = Some(0);
        config.contract.read_method = " ".to_string();
        config.observability.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "blockchain.failover_urls",
                "blockchain.rpc_timeout_secs",
                "contract.read_method",
                "observability.log_level",
            ]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
    }
}
