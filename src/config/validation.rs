//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, header names and scope conditions
//! - Warn about forwarder entries that can never grant trust
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderName;
use ipnetwork::IpNetwork;
use thiserror::Error;

use crate::config::schema::{ForwardingConfig, ServerConfig};
use crate::forward::trust::ALL;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidSocketAddr { field: &'static str, value: String },

    #[error("{field}: invalid header name {value:?}")]
    InvalidHeaderName { field: String, value: String },

    #[error("observability.log_format: expected \"pretty\" or \"json\", got {0:?}")]
    InvalidLogFormat(String),

    #[error("forwarding.scopes[{index}]: name must not be empty")]
    EmptyScopeName { index: usize },

    #[error("forwarding.scopes: duplicate scope name {0:?}")]
    DuplicateScope(String),

    #[error("scope {scope:?}: invalid remote_network {value:?}")]
    InvalidNetwork { scope: String, value: String },

    #[error("scope {scope:?}: {field} must not be empty")]
    EmptyCondition { scope: String, field: &'static str },
}

/// Check a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::InvalidLogFormat(other.to_string())),
    }

    validate_forwarding(&mut errors, &config.forwarding);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_forwarding(errors: &mut Vec<ValidationError>, forwarding: &ForwardingConfig) {
    check_headers(errors, "forwarding.headers", forwarding.headers.as_deref());
    warn_forwarders(&forwarding.forwarder, "root");

    let mut seen = HashSet::new();
    for (index, scope) in forwarding.scopes.iter().enumerate() {
        if scope.name.trim().is_empty() {
            errors.push(ValidationError::EmptyScopeName { index });
        } else if !seen.insert(scope.name.as_str()) {
            errors.push(ValidationError::DuplicateScope(scope.name.clone()));
        }

        let conditions = [
            ("host", &scope.host),
            ("path_prefix", &scope.path_prefix),
            ("scheme", &scope.scheme),
        ];
        for (field, value) in conditions {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                errors.push(ValidationError::EmptyCondition {
                    scope: scope.name.clone(),
                    field,
                });
            }
        }

        if let Some(network) = &scope.remote_network {
            if network.parse::<IpNetwork>().is_err() {
                errors.push(ValidationError::InvalidNetwork {
                    scope: scope.name.clone(),
                    value: network.clone(),
                });
            }
        }

        check_headers(
            errors,
            &format!("scope {:?} headers", scope.name),
            scope.headers.as_deref(),
        );
        if let Some(forwarder) = &scope.forwarder {
            warn_forwarders(forwarder, &scope.name);
        }
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidSocketAddr {
            field,
            value: value.to_string(),
        });
    }
}

fn check_headers(errors: &mut Vec<ValidationError>, field: &str, headers: Option<&[String]>) {
    for name in headers.unwrap_or_default() {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName {
                field: field.to_string(),
                value: name.clone(),
            });
        }
    }
}

// Accepted, but these entries can never make a peer trusted.
fn warn_forwarders<'a>(forwarder: impl IntoIterator<Item = (&'a String, &'a String)>, scope: &str) {
    for (addr, verdict) in forwarder {
        if addr != ALL && addr.parse::<IpAddr>().is_err() {
            tracing::warn!(
                %scope,
                forwarder = %addr,
                "forwarder is neither \"all\" nor an IP literal and will never match"
            );
        }
        if !verdict.eq_ignore_ascii_case("trust") {
            tracing::warn!(
                %scope,
                forwarder = %addr,
                value = %verdict,
                "forwarder value is not \"trust\", treated as untrusted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ScopeConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.observability.log_format = "xml".into();
        config.forwarding.headers = Some(vec!["X-Forwarded-For".into(), "bad header".into()]);
        config.forwarding.scopes = vec![
            ScopeConfig {
                name: "lan".into(),
                remote_network: Some("10.0.0.0/33".into()),
                ..Default::default()
            },
            ScopeConfig {
                name: "lan".into(),
                host: Some(" ".into()),
                ..Default::default()
            },
            ScopeConfig::default(),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 7, "{errors:?}");
        assert!(errors.contains(&ValidationError::DuplicateScope("lan".into())));
        assert!(errors.contains(&ValidationError::EmptyScopeName { index: 2 }));
        assert!(errors.contains(&ValidationError::InvalidNetwork {
            scope: "lan".into(),
            value: "10.0.0.0/33".into(),
        }));
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn odd_forwarder_entries_are_accepted() {
        let mut config = ServerConfig::default();
        config.forwarding.forwarder.insert("proxy.local".into(), "trust".into());
        config.forwarding.forwarder.insert("10.0.0.1".into(), "maybe".into());
        assert!(validate_config(&config).is_ok());
    }
}
