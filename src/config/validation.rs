//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Backend URLs are absolute plain-http URLs (no TLS client)
//! - Value ranges (timeouts > 0, cache sizes > 0)
//! - Method names and rate limits parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::security::rate_limit::RateLimit;

/// One semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn check_backend_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" && url.has_host() => {}
        Ok(url) if url.scheme() == "https" => errors.push(ValidationError::new(
            field,
            format!("{:?}: https backends are not supported, use an http:// URL", value),
        )),
        Ok(_) => errors.push(ValidationError::new(
            field,
            format!("{:?} must be an absolute http URL", value),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("{:?}: {}", value, e))),
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }

    check_backend_url("routing.default_service", &config.routing.default_service, &mut errors);
    for (origin, backend) in &config.routing.origin_mapping {
        if origin.trim().is_empty() {
            errors.push(ValidationError::new("routing.origin_mapping", "origin must not be empty"));
        }
        check_backend_url(
            &format!("routing.origin_mapping[{:?}]", origin),
            backend,
            &mut errors,
        );
    }

    if config.routing.allowed_methods.is_empty() {
        errors.push(ValidationError::new("routing.allowed_methods", "must not be empty"));
    }
    for method in &config.routing.allowed_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "routing.allowed_methods",
                format!("{:?} is not a valid HTTP method", method),
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.cache.enabled {
        if config.cache.ttl_secs == 0 {
            errors.push(ValidationError::new("cache.ttl_secs", "must be greater than 0"));
        }
        if config.cache.max_entries == 0 {
            errors.push(ValidationError::new("cache.max_entries", "must be greater than 0"));
        }
    }

    if config.rate_limit.enabled {
        if let Err(e) = config.rate_limit.limit.parse::<RateLimit>() {
            errors.push(ValidationError::new("rate_limit.limit", e.to_string()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    if let Some(log_file) = &config.observability.log_file {
        if std::path::Path::new(log_file).file_name().is_none() {
            errors.push(ValidationError::new(
                "observability.log_file",
                format!("{:?} does not name a file", log_file),
            ));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
