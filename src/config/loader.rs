//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
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

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_forwarding_section() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:8080"

            [forwarding]
            forwarder = { "10.0.0.232" = "trust", "all" = "deny" }

            [[forwarding.scopes]]
            name = "api"
            path_prefix = "/api"
            headers = []
            "#,
        )
        .unwrap();

        assert_eq!(config.forwarding.forwarder.len(), 2);
        assert_eq!(config.forwarding.forwarder["10.0.0.232"], "trust");
        assert_eq!(config.forwarding.headers, None);
        assert_eq!(config.forwarding.scopes[0].headers, Some(vec![]));
        assert_eq!(config.forwarding.scopes[0].forwarder, None);
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn empty_file_is_default() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.forwarding.forwarder.is_empty());
    }

    #[test]
    fn reports_validation_errors() {
        let err = parse_config(
            r#"
            [forwarding]
            headers = ["X Forwarded"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().starts_with("Validation failed: "));
    }

    #[test]
    fn reports_syntax_errors() {
        assert!(matches!(parse_config("[forwarding"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/forwarded-identity.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
