//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Forwarded client identity settings.
    pub forwarding: ForwardingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Scheme requests arrive with before any forwarded override.
    pub scheme: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            scheme: "http".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset.
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Root forwarding settings plus conditional scopes.
///
/// ```toml
/// [forwarding]
/// forwarder = { "10.0.0.232" = "trust", "10.0.0.233" = "trust" }
/// headers = ["X-Forwarded-For"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Proxy address (or "all") to "trust"; any other value means untrusted.
    pub forwarder: BTreeMap<String, String>,

    /// Forwarding headers in priority order. Unset or empty means
    /// `X-Forwarded-For`, then `Forwarded-For`.
    pub headers: Option<Vec<String>>,

    /// Conditional overrides, applied in order.
    pub scopes: Vec<ScopeConfig>,
}

/// A conditional block overriding the forwarding settings.
///
/// All conditions must hold for the scope to apply; a scope without
/// conditions always applies.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ScopeConfig {
    /// Scope identifier for logging.
    pub name: String,

    /// Host header to match (exact, case-insensitive).
    #[serde(default)]
    pub host: Option<String>,

    /// Path prefix to match.
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Remote address or CIDR network to match.
    #[serde(default)]
    pub remote_network: Option<String>,

    /// Request scheme to match (case-insensitive).
    #[serde(default)]
    pub scheme: Option<String>,

    /// Replaces the forwarder table when set.
    #[serde(default)]
    pub forwarder: Option<BTreeMap<String, String>>,

    /// Replaces the header list when set; an empty list selects the defaults.
    #[serde(default)]
    pub headers: Option<Vec<String>>,
}
