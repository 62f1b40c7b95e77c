//! Configuration validation.
//!
//! Returns all validation errors, not just the first. Runs before the config
//! is accepted into the system.

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("upstream.base_url `{0}` is not an absolute http(s) URL")]
    InvalidUpstreamUrl(String),
    #[error("upstream.path_prefix `{0}` must start with '/', must not end with '/' and must not contain braces")]
    InvalidPathPrefix(String),
    #[error("upstream.credential_header `{0}` is not a valid header name")]
    InvalidCredentialHeader(String),
    #[error("upstream.api_key is empty or not a valid header value")]
    InvalidApiKey,
    #[error("listener.port must be non-zero")]
    ZeroPort,
    #[error("limits.max_body_size must be non-zero")]
    ZeroBodyLimit,
    #[error("timeouts.request_secs must be non-zero when set")]
    ZeroTimeout,
    #[error("cors.allowed_methods contains invalid method `{0}`")]
    InvalidCorsMethod(String),
    #[error("cors.allowed_headers contains invalid header `{0}`")]
    InvalidCorsHeader(String),
    #[error("cors.allowed_origins contains invalid origin `{0}`")]
    InvalidCorsOrigin(String),
}

/// A prefix is a literal route: leading '/', no trailing '/', and no braces,
/// which the router would read as path captures.
pub fn is_valid_path_prefix(prefix: &str) -> bool {
    prefix.starts_with('/') && !prefix.ends_with('/') && !prefix.contains(['{', '}'])
}

/// Check semantic constraints serde cannot express.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let upstream = &config.upstream;

    match Url::parse(&upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.push(ValidationError::InvalidUpstreamUrl(upstream.base_url.clone())),
    }

    if !is_valid_path_prefix(&upstream.path_prefix) {
        errors.push(ValidationError::InvalidPathPrefix(upstream.path_prefix.clone()));
    }

    if HeaderName::from_bytes(upstream.credential_header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidCredentialHeader(
            upstream.credential_header.clone(),
        ));
    }

    if upstream.api_key.is_empty() || HeaderValue::from_str(&upstream.api_key).is_err() {
        errors.push(ValidationError::InvalidApiKey);
    }

    if config.listener.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.timeouts.request_secs == Some(0) {
        errors.push(ValidationError::ZeroTimeout);
    }

    for method in &config.cors.allowed_methods {
        if method.parse::<axum::http::Method>().is_err() {
            errors.push(ValidationError::InvalidCorsMethod(method.clone()));
        }
    }
    for header in &config.cors.allowed_headers {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidCorsHeader(header.clone()));
        }
    }
    for origin in &config.cors.allowed_origins {
        if HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::InvalidCorsOrigin(origin.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
