//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Store address must be a URI with a host
//! - Prefix and backoff values must be usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SyncConfig → Result<(), Vec<ValidationError>>
//! - Runs before any reconciliation begins

use thiserror::Error;
use url::Url;

use crate::config::schema::SyncConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("store address is required (expected format http://127.0.0.1:4001)")]
    MissingStoreAddress,

    #[error("invalid store address '{address}': {reason}")]
    InvalidStoreAddress { address: String, reason: String },

    #[error("watch prefix '{0}' must start with '/'")]
    PrefixWithoutSlash(String),

    #[error("admin address must not be empty")]
    EmptyAdminAddress,

    #[error("watch.base_delay_ms must be greater than zero")]
    ZeroBackoff,

    #[error("watch.max_delay_ms ({max}) is below watch.base_delay_ms ({base})")]
    BackoffInverted { base: u64, max: u64 },

    #[error("watch.queue_depth must be greater than zero")]
    ZeroQueueDepth,
}

/// Parse the store address, requiring a non-empty host.
pub fn parse_store_address(address: &str) -> Result<Url, ValidationError> {
    if address.trim().is_empty() {
        return Err(ValidationError::MissingStoreAddress);
    }

    let url = Url::parse(address).map_err(|e| ValidationError::InvalidStoreAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ValidationError::InvalidStoreAddress {
            address: address.to_string(),
            reason: "missing host".to_string(),
        }),
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = parse_store_address(&config.store.address) {
        errors.push(e);
    }

    if !config.store.prefix.starts_with('/') {
        errors.push(ValidationError::PrefixWithoutSlash(config.store.prefix.clone()));
    }

    if config.reload.admin_address.trim().is_empty() {
        errors.push(ValidationError::EmptyAdminAddress);
    }

    if config.watch.base_delay_ms == 0 {
        errors.push(ValidationError::ZeroBackoff);
    } else if config.watch.max_delay_ms < config.watch.base_delay_ms {
        errors.push(ValidationError::BackoffInverted {
            base: config.watch.base_delay_ms,
            max: config.watch.max_delay_ms,
        });
    }

    if config.watch.queue_depth == 0 {
        errors.push(ValidationError::ZeroQueueDepth);
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

    fn valid() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.store.address = "http://127.0.0.1:4001".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_store_address_needs_host() {
        assert!(parse_store_address("http://127.0.0.1:4001").is_ok());
        assert_eq!(parse_store_address(""), Err(ValidationError::MissingStoreAddress));
        assert!(matches!(
            parse_store_address("127.0.0.1"),
            Err(ValidationError::InvalidStoreAddress { .. })
        ));
        assert!(matches!(
            parse_store_address("unix:/var/run/etcd.sock"),
            Err(ValidationError::InvalidStoreAddress { .. })
        ));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = SyncConfig::default();
        config.store.prefix = "varnish".to_string();
        config.watch.base_delay_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::MissingStoreAddress));
        assert!(errors.contains(&ValidationError::ZeroBackoff));
    }
}
