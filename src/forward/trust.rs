//! Trusted-proxy determination.
//!
//! # Responsibilities
//! - Hold the merged forwarder table and header list for one request scope
//! - Decide whether the directly connected peer is a trusted proxy
//! - Walk a forwarding chain backwards to find the real client
//!
//! # Design Decisions
//! - Default deny: an address without an explicit `trust` entry is untrusted
//! - `"all"` overrides every other entry for the connecting peer; "all except"
//!   cannot be expressed
//! - The `"all"` wildcard is never applied to hops inside the header. A hop is
//!   vouched for only by its own explicit entry.
//! - Tables are behind `Arc` so merged views are cheap to build per request

use std::collections::HashMap;
use std::sync::Arc;

use crate::forward::chain::AddressChain;

/// Forwarder key matching every peer address.
pub const ALL: &str = "all";

/// Header names consulted when none are configured.
pub const DEFAULT_HEADERS: [&str; 2] = ["X-Forwarded-For", "Forwarded-For"];

/// Trust verdict for a configured forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Trusted,
    Untrusted,
}

impl Verdict {
    /// Interpret a configured value. Only `trust` (any case) grants trust.
    pub fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("trust") {
            Verdict::Trusted
        } else {
            Verdict::Untrusted
        }
    }
}

/// Forwarder address (or `"all"`) to verdict.
pub type ForwarderTable = HashMap<String, Verdict>;

/// Flat, already-merged trust settings for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustConfig {
    forwarder: Arc<ForwarderTable>,
    header_names: Arc<[String]>,
}

impl TrustConfig {
    /// Build from shared tables. An empty header list falls back to
    /// [`DEFAULT_HEADERS`].
    pub fn new(forwarder: Arc<ForwarderTable>, header_names: Arc<[String]>) -> Self {
        let header_names = if header_names.is_empty() {
            default_headers()
        } else {
            header_names
        };
        Self {
            forwarder,
            header_names,
        }
    }

    /// Build from raw `address => value` pairs as they appear in config.
    pub fn from_pairs<I, K, V>(forwarder: I, header_names: &[&str]) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let table: ForwarderTable = forwarder
            .into_iter()
            .map(|(k, v)| (k.into(), Verdict::from_config(v.as_ref())))
            .collect();
        let headers: Arc<[String]> = header_names.iter().map(|h| h.to_string()).collect();
        Self::new(Arc::new(table), headers)
    }

    /// Forwarding header names in priority order.
    pub fn header_names(&self) -> &[String] {
        &self.header_names
    }

    /// Whether a directly connected peer may be believed.
    pub fn is_trusted(&self, addr_text: &str) -> bool {
        if let Some(all) = self.forwarder.get(ALL) {
            return *all == Verdict::Trusted;
        }
        self.is_explicitly_trusted(addr_text)
    }

    fn is_explicitly_trusted(&self, addr_text: &str) -> bool {
        addr_text != ALL && self.forwarder.get(addr_text) == Some(&Verdict::Trusted)
    }

    /// Right-most hop in the chain that no trusted proxy vouches for.
    ///
    /// Everything to its right was appended by trusted proxies, so it is the
    /// most credible client address available. Returns `None` when the chain
    /// is empty or every hop is trusted.
    pub fn find_real_client<'a>(&self, chain: &AddressChain<'a>) -> Option<&'a str> {
        chain
            .iter_rev()
            .find(|addr| *addr != ALL && !self.is_explicitly_trusted(addr))
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self::new(Arc::default(), default_headers())
    }
}

fn default_headers() -> Arc<[String]> {
    DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect()
}
