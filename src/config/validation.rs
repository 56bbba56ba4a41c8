//! Configuration validation.
//!
//! Semantic checks that serde cannot express. Returns every problem found,
//! not just the first.

use crate::config::schema::ServiceConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service_name.trim().is_empty() {
        errors.push(ValidationError::new("service_name", "must not be empty"));
    }

    for (i, node) in config.connect.iter().enumerate() {
        if node.rpc_port == 0 {
            errors.push(ValidationError::new(format!("connect[{}].rpc_port", i), "must be non-zero"));
        }
        if node.rpc_host.trim().is_empty() {
            errors.push(ValidationError::new(format!("connect[{}].rpc_host", i), "must not be empty"));
        }
        if let Some(endpoint) = &node.zmq_pub_raw_tx {
            if url::Url::parse(endpoint).is_err() {
                errors.push(ValidationError::new(
                    format!("connect[{}].zmq_pub_raw_tx", i),
                    format!("'{}' is not a valid endpoint", endpoint),
                ));
            }
        }
    }

    if let Some(spawn) = &config.spawn {
        if spawn.exec.as_os_str().is_empty() {
            errors.push(ValidationError::new("spawn.exec", "must not be empty"));
        }
    }

    if config.timing.start_retry_count == 0 {
        errors.push(ValidationError::new("timing.start_retry_count", "must be at least 1"));
    }
    if config.timing.shutdown_timeout_ms == 0 {
        errors.push(ValidationError::new("timing.shutdown_timeout_ms", "must be non-zero"));
    }

    let limits = &config.limits;
    for (field, value) in [
        ("limits.max_addresses_query", limits.max_addresses_query),
        ("limits.max_history_query_length", limits.max_history_query_length),
        ("limits.max_txids", limits.max_txids),
        ("limits.transaction_concurrency", limits.transaction_concurrency),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be non-zero"));
        }
    }

    let cache = &config.cache;
    for (field, value) in [
        ("cache.block", cache.block),
        ("cache.raw_block", cache.raw_block),
        ("cache.block_header", cache.block_header),
        ("cache.transaction", cache.transaction),
        ("cache.raw_transaction", cache.raw_transaction),
        ("cache.transaction_detailed", cache.transaction_detailed),
        ("cache.utxos", cache.utxos),
        ("cache.txids", cache.txids),
        ("cache.balance", cache.balance),
        ("cache.summary", cache.summary),
        ("cache.masternode_list", cache.masternode_list),
        ("cache.address_script", cache.address_script),
        ("cache.seen_blocks", cache.seen_blocks),
        ("cache.seen_transactions", cache.seen_transactions),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "capacity must be non-zero"));
        }
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
