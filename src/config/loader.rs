//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming the service.
pub const ENV_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
/// Environment variable holding the collector endpoint.
pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Optional override of the downstream URL.
pub const ENV_DOWNSTREAM_URL: &str = "DOWNSTREAM_URL";
/// Optional override of the listener address.
pub const ENV_BIND_ADDRESS: &str = "HTTP_BIND_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Overlay environment values onto `config`.
///
/// `lookup` abstracts the environment so callers can supply their own source.
/// Empty values count as absent.
pub fn apply_env<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(name) = get(ENV_SERVICE_NAME) {
        config.telemetry.service_name = name;
    }
    if let Some(endpoint) = get(ENV_OTLP_ENDPOINT) {
        config.telemetry.otlp_endpoint = endpoint;
    }
    if let Some(url) = get(ENV_DOWNSTREAM_URL) {
        config.downstream.url = url;
    }
    if let Some(addr) = get(ENV_BIND_ADDRESS) {
        config.server.bind_address = addr;
    }
}

/// Load configuration: optional TOML file, then environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => AppConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
