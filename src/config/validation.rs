//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, timeouts > 0)
//! - Check that the API URL and custom headers are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SyncConfig → Result<(), Vec<ValidationError>>

use reqwest::header::{HeaderName, HeaderValue};

use crate::config::schema::SyncConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
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

/// Check `config` for semantic problems.
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.api.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "api.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("api.url", e.to_string())),
    }

    if config.api.app_name.trim().is_empty() {
        errors.push(ValidationError::new("api.app_name", "must not be empty"));
    }

    for (name, value) in &config.api.custom_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "api.custom_headers",
                format!("invalid header name '{name}'"),
            ));
        }
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(
                "api.custom_headers",
                format!("invalid value for header '{name}'"),
            ));
        }
    }

    if config.api.request_timeout_secs == 0 {
        errors.push(ValidationError::new("api.request_timeout_secs", "must be > 0"));
    }

    if config.polling.max_backoff_secs < config.polling.interval_secs {
        errors.push(ValidationError::new(
            "polling.max_backoff_secs",
            "must be >= polling.interval_secs",
        ));
    }

    if config.streaming.max_fails == 0 {
        errors.push(ValidationError::new("streaming.max_fails", "must be > 0"));
    }
    if config.streaming.fail_window_ms == 0 {
        errors.push(ValidationError::new("streaming.fail_window_ms", "must be > 0"));
    }
    if config.streaming.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "streaming.connect_timeout_secs",
            "must be > 0",
        ));
    }
    if config.streaming.read_timeout_secs == 0 {
        errors.push(ValidationError::new("streaming.read_timeout_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
