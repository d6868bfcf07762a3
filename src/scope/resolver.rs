//! Scope resolution and merge.
//!
//! # Responsibilities
//! - Compile `[forwarding]` and its scopes into an immutable resolver
//! - Evaluate scope conditions for a request (through its condition cache)
//! - Merge root and matching scopes into one `TrustConfig`
//!
//! # Design Decisions
//! - Scopes are applied in file order; a scope overrides only the keys it sets
//! - Root `headers` unset or empty selects the default pair; in a scope,
//!   unset inherits and an explicit empty list selects the default pair
//! - Forwarder tables and header lists are built once and shared by `Arc`

use std::sync::Arc;

use ipnetwork::IpNetwork;

use crate::config::schema::{ForwardingConfig, ScopeConfig};
use crate::config::validation::ValidationError;
use crate::forward::identity::RequestState;
use crate::forward::trust::{ForwarderTable, TrustConfig, Verdict};
use crate::scope::condition::{
    Condition, HostCondition, PathPrefixCondition, RemoteNetworkCondition, RequestFacts,
    RequestMeta, SchemeCondition,
};

#[derive(Debug)]
struct CompiledCondition {
    id: usize,
    condition: Box<dyn Condition>,
}

#[derive(Debug)]
struct CompiledScope {
    name: String,
    conditions: Vec<CompiledCondition>,
    forwarder: Option<Arc<ForwarderTable>>,
    headers: Option<Arc<[String]>>,
}

/// Merged settings for one request.
#[derive(Debug, Clone)]
pub struct Resolution<'r> {
    pub trust: TrustConfig,
    /// Names of the scopes that matched, in file order.
    pub matched: Vec<&'r str>,
}

/// Immutable, compiled view of the forwarding configuration.
#[derive(Debug)]
pub struct ScopeResolver {
    forwarder: Arc<ForwarderTable>,
    headers: Arc<[String]>,
    scopes: Vec<CompiledScope>,
}

fn compile_table<'a>(
    forwarder: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Arc<ForwarderTable> {
    Arc::new(
        forwarder
            .into_iter()
            .map(|(addr, value)| (addr.clone(), Verdict::from_config(value)))
            .collect(),
    )
}

fn compile_headers(headers: &[String]) -> Arc<[String]> {
    headers.iter().cloned().collect()
}

impl ScopeResolver {
    /// Compile the forwarding configuration.
    pub fn from_config(config: &ForwardingConfig) -> Result<Self, ValidationError> {
        let mut next_id = 0;
        let scopes = config
            .scopes
            .iter()
            .map(|scope| compile_scope(scope, &mut next_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            forwarder: compile_table(&config.forwarder),
            headers: compile_headers(config.headers.as_deref().unwrap_or_default()),
            scopes,
        })
    }

    /// Number of compiled scopes.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Merge the root settings with every scope matching the request's
    /// current identity.
    pub fn resolve(&self, meta: &RequestMeta, state: &mut RequestState) -> Resolution<'_> {
        let (identity, cache) = state.identity_and_conditions();
        let facts = RequestFacts { meta, identity };

        let mut forwarder = &self.forwarder;
        let mut headers = &self.headers;
        let mut matched = Vec::new();

        for scope in &self.scopes {
            let applies = scope.conditions.iter().all(|c| {
                cache.get_or_eval(c.condition.domain(), c.id, || c.condition.matches(&facts))
            });
            if !applies {
                continue;
            }

            if let Some(table) = &scope.forwarder {
                forwarder = table;
            }
            if let Some(list) = &scope.headers {
                headers = list;
            }
            matched.push(scope.name.as_str());
        }

        Resolution {
            trust: TrustConfig::new(Arc::clone(forwarder), Arc::clone(headers)),
            matched,
        }
    }
}

fn compile_scope(
    scope: &ScopeConfig,
    next_id: &mut usize,
) -> Result<CompiledScope, ValidationError> {
    let mut conditions: Vec<Box<dyn Condition>> = Vec::new();

    if let Some(host) = &scope.host {
        conditions.push(Box::new(HostCondition::new(host.as_str())));
    }
    if let Some(prefix) = &scope.path_prefix {
        conditions.push(Box::new(PathPrefixCondition::new(prefix.as_str())));
    }
    if let Some(network) = &scope.remote_network {
        let network: IpNetwork = network.parse().map_err(|_| ValidationError::InvalidNetwork {
            scope: scope.name.clone(),
            value: network.clone(),
        })?;
        conditions.push(Box::new(RemoteNetworkCondition::new(network)));
    }
    if let Some(scheme) = &scope.scheme {
        conditions.push(Box::new(SchemeCondition::new(scheme.as_str())));
    }

    let conditions = conditions
        .into_iter()
        .map(|condition| {
            let id = *next_id;
            *next_id += 1;
            CompiledCondition { id, condition }
        })
        .collect();

    Ok(CompiledScope {
        name: scope.name.clone(),
        conditions,
        forwarder: scope.forwarder.as_ref().map(|f| compile_table(f)),
        headers: scope.headers.as_deref().map(compile_headers),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::identity::RequestIdentity;
    use crate::scope::cache::CacheDomain;
    use std::collections::BTreeMap;

    fn table(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn state(peer: &str) -> RequestState {
        RequestState::new(RequestIdentity::from_peer(peer.parse().unwrap(), "http"))
    }

    fn meta(host: &str, path: &str) -> RequestMeta {
        RequestMeta {
            host: Some(host.to_string()),
            path: path.to_string(),
        }
    }

    fn config() -> ForwardingConfig {
        ForwardingConfig {
            forwarder: table(&[("10.0.0.232", "trust")]),
            headers: None,
            scopes: vec![
                ScopeConfig {
                    name: "api".into(),
                    path_prefix: Some("/api".into()),
                    headers: Some(vec!["X-Real-Forwarded-For".into()]),
                    ..Default::default()
                },
                ScopeConfig {
                    name: "edge".into(),
                    host: Some("edge.example".into()),
                    forwarder: Some(table(&[("all", "trust")])),
                    ..Default::default()
                },
                ScopeConfig {
                    name: "reset-headers".into(),
                    host: Some("legacy.example".into()),
                    headers: Some(vec![]),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn root_only_when_nothing_matches() {
        let resolver = ScopeResolver::from_config(&config()).unwrap();
        let mut st = state("10.0.0.232:1000");

        let res = resolver.resolve(&meta("www.example", "/"), &mut st);
        assert!(res.matched.is_empty());
        assert!(res.trust.is_trusted("10.0.0.232"));
        assert!(!res.trust.is_trusted("10.0.0.233"));
        assert_eq!(res.trust.header_names(), &["X-Forwarded-For", "Forwarded-For"]);
    }

    #[test]
    fn scope_overrides_only_keys_it_sets() {
        let resolver = ScopeResolver::from_config(&config()).unwrap();
        let mut st = state("10.0.0.232:1000");

        let res = resolver.resolve(&meta("www.example", "/api/users"), &mut st);
        assert_eq!(res.matched, vec!["api"]);
        assert_eq!(res.trust.header_names(), &["X-Real-Forwarded-For"]);
        assert!(res.trust.is_trusted("10.0.0.232"));
        assert!(!res.trust.is_trusted("192.0.2.1"));

        let mut st = state("10.0.0.232:1000");
        let res = resolver.resolve(&meta("edge.example", "/api/users"), &mut st);
        assert_eq!(res.matched, vec!["api", "edge"]);
        assert_eq!(res.trust.header_names(), &["X-Real-Forwarded-For"]);
        assert!(res.trust.is_trusted("192.0.2.1"));
    }

    #[test]
    fn explicit_empty_scope_headers_select_defaults() {
        let resolver = ScopeResolver::from_config(&config()).unwrap();
        let mut st = state("10.0.0.232:1000");

        let res = resolver.resolve(&meta("legacy.example", "/api"), &mut st);
        assert_eq!(res.matched, vec!["api", "reset-headers"]);
        assert_eq!(res.trust.header_names(), &["X-Forwarded-For", "Forwarded-For"]);
    }

    #[test]
    fn remote_conditions_follow_substitution() {
        let config = ForwardingConfig {
            forwarder: table(&[("10.0.0.232", "trust")]),
            headers: None,
            scopes: vec![ScopeConfig {
                name: "lan".into(),
                remote_network: Some("10.0.0.0/8".into()),
                ..Default::default()
            }],
        };
        let resolver = ScopeResolver::from_config(&config).unwrap();
        let m = meta("www.example", "/");
        let mut st = state("10.0.0.232:1000");

        assert_eq!(resolver.resolve(&m, &mut st).matched, vec!["lan"]);
        assert_eq!(st.identity_and_conditions().1.get(CacheDomain::RemoteIp, 0), Some(true));

        st.apply("203.0.113.5").unwrap();
        assert!(resolver.resolve(&m, &mut st).matched.is_empty());

        st.restore();
        assert_eq!(resolver.resolve(&m, &mut st).matched, vec!["lan"]);
    }

    #[test]
    fn bad_network_fails_compilation() {
        let config = ForwardingConfig {
            scopes: vec![ScopeConfig {
                name: "broken".into(),
                remote_network: Some("not-a-network".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            ScopeResolver::from_config(&config),
            Err(ValidationError::InvalidNetwork { .. })
        ));
    }
}
