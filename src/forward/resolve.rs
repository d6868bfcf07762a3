//! Numeric-only address resolution.
//!
//! Turns an address literal into a socket address without touching DNS, so
//! it is safe to call from the request path.

use std::net::{AddrParseError, IpAddr, SocketAddr};

use thiserror::Error;

/// A forwarded address that is not a usable IP literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("could not parse ip address {text:?}: empty input")]
    Empty { text: String },
    #[error("could not parse ip address {text:?}: {source}")]
    Invalid {
        text: String,
        #[source]
        source: AddrParseError,
    },
}

/// Resolve an IPv4 or IPv6 literal. The port of the result is 0.
pub fn resolve_numeric(text: &str) -> Result<SocketAddr, AddressParseError> {
    if text.is_empty() {
        return Err(AddressParseError::Empty {
            text: text.to_string(),
        });
    }

    text.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, 0))
        .map_err(|source| AddressParseError::Invalid {
            text: text.to_string(),
            source,
        })
}
