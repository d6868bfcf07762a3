//! Request lifecycle binding.
//!
//! # Hooks
//! ```text
//! headers available  → handle_request_headers  (select header, trust peer,
//!                                                 extract chain, apply)
//! request complete   → handle_request_done     ┐
//! connection reset   → handle_connection_reset ┴→ restore (same path)
//! ```
//!
//! Nothing here can fail a request. Every failure degrades to keeping the
//! unforwarded identity.

use axum::http::HeaderMap;

use crate::forward::chain::extract;
use crate::forward::identity::RequestState;
use crate::forward::trust::TrustConfig;

/// Header carrying the scheme the client used towards the first proxy.
pub const X_FORWARDED_PROTO: &str = "X-Forwarded-Proto";

/// What `handle_request_headers` did with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// None of the configured forwarding headers is present.
    NoForwardHeader,
    /// The socket peer is not a trusted proxy; its header was ignored.
    UntrustedPeer,
    /// The chain was empty or every hop was trusted.
    NoRealClient,
    /// The selected client address is not an IP literal.
    Unparsable,
    /// The identity now carries the forwarded client.
    Substituted { client: String, scheme_changed: bool },
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NoForwardHeader => "no_forward_header",
            Outcome::UntrustedPeer => "untrusted_peer",
            Outcome::NoRealClient => "no_real_client",
            Outcome::Unparsable => "unparsable",
            Outcome::Substituted { .. } => "substituted",
        }
    }
}

/// Why a restore ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePath {
    RequestDone,
    ConnectionReset,
}

impl RestorePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestorePath::RequestDone => "request_done",
            RestorePath::ConnectionReset => "connection_reset",
        }
    }
}

/// First configured forwarding header present in the request.
fn select_forward_header<'h>(cfg: &'h TrustConfig, headers: &HeaderMap) -> Option<&'h str> {
    cfg.header_names()
        .iter()
        .map(String::as_str)
        .find(|name| headers.contains_key(*name))
}

/// All field lines of `name`, joined in arrival order.
fn joined_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run when request headers are available.
pub fn handle_request_headers(
    cfg: &TrustConfig,
    state: &mut RequestState,
    headers: &HeaderMap,
) -> Outcome {
    let Some(header) = select_forward_header(cfg, headers) else {
        tracing::debug!("no forward header found, skipping");
        return Outcome::NoForwardHeader;
    };

    let peer = &state.identity().remote_address_text;
    if !cfg.is_trusted(peer) {
        tracing::debug!(%peer, "remote address is not a trusted proxy, skipping");
        return Outcome::UntrustedPeer;
    }

    let raw = joined_value(headers, header);
    let chain = extract(&raw);
    let Some(client) = cfg.find_real_client(&chain) else {
        tracing::debug!(%header, hops = chain.len(), "no untrusted hop in forward header");
        return Outcome::NoRealClient;
    };

    if let Err(err) = state.apply(client) {
        tracing::error!(%header, error = %err, "forwarded client address rejected");
        return Outcome::Unparsable;
    }

    // repeated lines fold into one value, which the scheme gate then rejects
    let scheme_changed = headers.contains_key(X_FORWARDED_PROTO)
        && state.apply_scheme(&joined_value(headers, X_FORWARDED_PROTO));

    Outcome::Substituted {
        client: client.to_string(),
        scheme_changed,
    }
}

/// Run when the request has completed normally.
pub fn handle_request_done(state: &mut RequestState) -> bool {
    restore(state, RestorePath::RequestDone)
}

/// Run when the request is torn down before completing.
pub fn handle_connection_reset(state: &mut RequestState) -> bool {
    restore(state, RestorePath::ConnectionReset)
}

fn restore(state: &mut RequestState, path: RestorePath) -> bool {
    let restored = state.restore();
    if restored {
        tracing::debug!(
            path = path.as_str(),
            peer = %state.identity().remote_address_text,
            "restored original remote address"
        );
    }
    restored
}
