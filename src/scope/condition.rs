//! Scope condition matching.
//!
//! # Responsibilities
//! - Match host header (exact match, case-insensitive, port ignored)
//! - Match path prefix (case-sensitive)
//! - Match remote address against an IP or CIDR network
//! - Match request scheme (case-insensitive)
//!
//! # Design Decisions
//! - Remote address and scheme are read from the live request identity, so
//!   their results change when a forwarded client is substituted
//! - Each condition names the cache domain its result belongs to

use std::fmt::Debug;

use ipnetwork::IpNetwork;

use crate::forward::identity::RequestIdentity;
use crate::scope::cache::CacheDomain;

/// Request attributes that do not change during substitution.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub host: Option<String>,
    pub path: String,
}

/// Everything a condition may look at.
#[derive(Debug, Clone, Copy)]
pub struct RequestFacts<'a> {
    pub meta: &'a RequestMeta,
    pub identity: &'a RequestIdentity,
}

/// A single scope condition.
pub trait Condition: Send + Sync + Debug {
    /// Cache domain the result is filed under.
    fn domain(&self) -> CacheDomain;

    /// Returns true if the request satisfies this condition.
    fn matches(&self, facts: &RequestFacts<'_>) -> bool;
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostCondition {
    expected_host: String,
}

impl HostCondition {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Condition for HostCondition {
    fn domain(&self) -> CacheDomain {
        CacheDomain::Host
    }

    fn matches(&self, facts: &RequestFacts<'_>) -> bool {
        let Some(host) = facts.meta.host.as_deref() else {
            return false;
        };
        if host.eq_ignore_ascii_case(&self.expected_host) {
            return true;
        }
        host.rsplit_once(':').is_some_and(|(name, port)| {
            port.bytes().all(|b| b.is_ascii_digit())
                && name.eq_ignore_ascii_case(&self.expected_host)
        })
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixCondition {
    prefix: String,
}

impl PathPrefixCondition {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Condition for PathPrefixCondition {
    fn domain(&self) -> CacheDomain {
        CacheDomain::Path
    }

    fn matches(&self, facts: &RequestFacts<'_>) -> bool {
        facts.meta.path.starts_with(&self.prefix)
    }
}

/// Matches the remote address against a network.
#[derive(Debug, Clone)]
pub struct RemoteNetworkCondition {
    network: IpNetwork,
}

impl RemoteNetworkCondition {
    pub fn new(network: IpNetwork) -> Self {
        Self { network }
    }
}

impl Condition for RemoteNetworkCondition {
    fn domain(&self) -> CacheDomain {
        CacheDomain::RemoteIp
    }

    fn matches(&self, facts: &RequestFacts<'_>) -> bool {
        self.network.contains(facts.identity.remote_address.ip())
    }
}

/// Matches the request scheme.
#[derive(Debug, Clone)]
pub struct SchemeCondition {
    scheme: String,
}

impl SchemeCondition {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_lowercase(),
        }
    }
}

impl Condition for SchemeCondition {
    fn domain(&self) -> CacheDomain {
        CacheDomain::Scheme
    }

    fn matches(&self, facts: &RequestFacts<'_>) -> bool {
        facts.identity.scheme.eq_ignore_ascii_case(&self.scheme)
    }
}
