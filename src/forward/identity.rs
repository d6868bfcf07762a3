//! Request identity substitution and restoration.
//!
//! # State Machine
//! ```text
//! Original ──apply──▶ Substituted ──restore──▶ Original
//!                        │    ▲
//!                        └────┘ apply again (stale record discarded)
//! ```
//!
//! # Design Decisions
//! - The saved identity lives in an explicit `Option<SubstitutionRecord>`;
//!   `Some` means a restore is owed
//! - `restore` is idempotent and is the only way back to `Original`
//! - Every change to the address or scheme invalidates the matching
//!   condition cache domain

use std::net::SocketAddr;

use crate::forward::resolve::{resolve_numeric, AddressParseError};
use crate::scope::cache::{CacheDomain, ConditionCache};

/// Who the request appears to come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub remote_address: SocketAddr,
    pub remote_address_text: String,
    pub scheme: String,
}

impl RequestIdentity {
    /// Identity of a request as received from the socket peer.
    pub fn from_peer(peer: SocketAddr, scheme: impl Into<String>) -> Self {
        Self {
            remote_address: peer,
            remote_address_text: peer.ip().to_string(),
            scheme: scheme.into(),
        }
    }
}

/// Identity values saved by `apply`, put back by `restore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionRecord {
    saved_address: SocketAddr,
    saved_address_text: String,
    saved_scheme: Option<String>,
}

impl SubstitutionRecord {
    pub fn saved_address_text(&self) -> &str {
        &self.saved_address_text
    }
}

/// Mutable per-request state: the live identity, the pending restore record
/// and the decisions cached against that identity.
#[derive(Debug)]
pub struct RequestState {
    identity: RequestIdentity,
    substitution: Option<SubstitutionRecord>,
    conditions: ConditionCache,
}

impl RequestState {
    pub fn new(identity: RequestIdentity) -> Self {
        Self {
            identity,
            substitution: None,
            conditions: ConditionCache::new(),
        }
    }

    pub fn identity(&self) -> &RequestIdentity {
        &self.identity
    }

    pub fn substitution(&self) -> Option<&SubstitutionRecord> {
        self.substitution.as_ref()
    }

    pub fn is_substituted(&self) -> bool {
        self.substitution.is_some()
    }

    /// Split borrow for evaluating conditions against the live identity.
    pub fn identity_and_conditions(&mut self) -> (&RequestIdentity, &mut ConditionCache) {
        (&self.identity, &mut self.conditions)
    }

    /// Replace the remote address with `candidate_text`.
    ///
    /// On a parse failure nothing changes and the request keeps its original
    /// identity.
    pub fn apply(&mut self, candidate_text: &str) -> Result<(), AddressParseError> {
        let resolved = resolve_numeric(candidate_text)?;

        if let Some(stale) = self.substitution.take() {
            tracing::warn!(
                saved = %stale.saved_address_text,
                current = %self.identity.remote_address_text,
                "identity already substituted for this request, resetting state"
            );
        }

        let saved_address = std::mem::replace(&mut self.identity.remote_address, resolved);
        let saved_address_text = std::mem::replace(
            &mut self.identity.remote_address_text,
            candidate_text.to_string(),
        );
        self.substitution = Some(SubstitutionRecord {
            saved_address,
            saved_address_text,
            saved_scheme: None,
        });

        tracing::debug!(client = %candidate_text, "substituted remote address");

        self.invalidate_conditions();
        Ok(())
    }

    /// Override the scheme with a forwarded `http`/`https` value.
    ///
    /// Only meaningful after a successful `apply`; any other value, or a call
    /// with nothing substituted, leaves the scheme alone. Returns whether the
    /// scheme changed.
    pub fn apply_scheme(&mut self, candidate_scheme: &str) -> bool {
        let Some(record) = self.substitution.as_mut() else {
            return false;
        };

        let scheme = if candidate_scheme.eq_ignore_ascii_case("https") {
            "https"
        } else if candidate_scheme.eq_ignore_ascii_case("http") {
            "http"
        } else {
            tracing::debug!(scheme = %candidate_scheme, "ignoring forwarded scheme");
            return false;
        };

        if self.identity.scheme == scheme {
            return false;
        }

        let previous = std::mem::replace(&mut self.identity.scheme, scheme.to_string());
        record.saved_scheme.get_or_insert(previous);
        self.conditions.invalidate(CacheDomain::Scheme);
        true
    }

    /// Put back the identity saved by `apply`. No-op when nothing is owed.
    pub fn restore(&mut self) -> bool {
        let Some(record) = self.substitution.take() else {
            return false;
        };

        self.identity.remote_address = record.saved_address;
        self.identity.remote_address_text = record.saved_address_text;
        if let Some(scheme) = record.saved_scheme {
            self.identity.scheme = scheme;
        }

        self.invalidate_conditions();
        true
    }

    fn invalidate_conditions(&mut self) {
        self.conditions.invalidate(CacheDomain::RemoteIp);
        self.conditions.invalidate(CacheDomain::Scheme);
    }
}
