//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GateConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every field and return all problems found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    let addresses = [
        ("listener.bind_address", &config.listener.bind_address),
        ("upstream.address", &config.upstream.address),
    ];
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            issues.push(ConfigIssue::new(field, format!("invalid socket address '{}'", value)));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ConfigIssue::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if config.description.path.trim().is_empty() {
        issues.push(ConfigIssue::new("description.path", "must not be empty"));
    }

    if config.validation.max_body_bytes == 0 {
        issues.push(ConfigIssue::new("validation.max_body_bytes", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        issues.push(ConfigIssue::new("timeouts.request_secs", "must be greater than 0"));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
