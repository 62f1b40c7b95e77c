//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Port environment variable.
pub const ENV_PORT: &str = "PORT";
/// Upstream base URL environment variable.
pub const ENV_UPSTREAM_URL: &str = "RELAY_UPSTREAM_URL";
/// Default credential environment variable.
pub const ENV_API_KEY: &str = "RELAY_API_KEY";
/// Path prefix environment variable.
pub const ENV_PATH_PREFIX: &str = "RELAY_PATH_PREFIX";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: `{value}`")]
    Env { var: &'static str, value: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML document into a config. Missing sections take defaults.
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts `std::env::var` so the layering can be exercised
/// without touching the process environment.
pub fn apply_env_overrides<F>(mut config: RelayConfig, lookup: F) -> Result<RelayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(ENV_PORT) {
        config.listener.port = port.trim().parse().map_err(|_| ConfigError::Env {
            var: ENV_PORT,
            value: port.clone(),
        })?;
    }
    if let Some(url) = lookup(ENV_UPSTREAM_URL) {
        config.upstream.base_url = url;
    }
    if let Some(key) = lookup(ENV_API_KEY) {
        config.upstream.api_key = key;
    }
    if let Some(prefix) = lookup(ENV_PATH_PREFIX) {
        config.upstream.path_prefix = prefix;
    }
    Ok(config)
}

/// Build the effective configuration: defaults, then the optional TOML file,
/// then the process environment, then `port` from the command line. The
/// result is validated.
pub fn load_config(path: Option<&Path>, port: Option<u16>) -> Result<RelayConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => RelayConfig::default(),
    };

    let mut config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
    if let Some(port) = port {
        config.listener.port = port;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = parse_config(
            r#"
            [upstream]
            base_url = "http://127.0.0.1:54321"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.base_url, "http://127.0.0.1:54321");
        assert_eq!(config.upstream.credential_header, "apikey");
        assert_eq!(config.upstream.path_prefix, "/proxy");
        assert_eq!(config.listener.port, 4000);
        assert_eq!(
            config.observability.log_format,
            crate::config::schema::LogFormat::Json
        );
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        assert!(matches!(
            parse_config("[listener]\nport = \"eighty\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config = apply_env_overrides(
            RelayConfig::default(),
            env(&[
                ("PORT", "8088"),
                ("RELAY_UPSTREAM_URL", "http://localhost:9999"),
                ("RELAY_API_KEY", "local-key"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.port, 8088);
        assert_eq!(config.upstream.base_url, "http://localhost:9999");
        assert_eq!(config.upstream.api_key, "local-key");
        assert_eq!(config.upstream.path_prefix, "/proxy");
    }

    #[test]
    fn test_unset_env_leaves_defaults() {
        let config = apply_env_overrides(RelayConfig::default(), env(&[])).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_port_override_is_validated() {
        match load_config(None, Some(0)) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.contains(&ValidationError::ZeroPort))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_port_override_wins() {
        let config = load_config(None, Some(8123)).unwrap();
        assert_eq!(config.listener.port, 8123);
    }

    #[test]
    fn test_bad_port_env() {
        let err = apply_env_overrides(RelayConfig::default(), env(&[("PORT", "http")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for PORT: `http`");
    }
}
