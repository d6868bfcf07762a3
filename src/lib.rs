//! Forwarded client identity for HTTP servers.
//!
//! Replaces a request's socket-level client address with the real client
//! named in `X-Forwarded-For` / `Forwarded` style headers, but only when the
//! connecting peer is a trusted forwarder, and restores the original
//! identity once the request is finished or aborted.

pub mod config;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod scope;

pub use config::schema::ServerConfig;
pub use forward::{RequestIdentity, RequestState, TrustConfig};
pub use http::HttpServer;
pub use scope::ScopeResolver;
