//! Conditional configuration scopes.
//!
//! # Data Flow
//! ```text
//! ForwardingConfig (root + [[forwarding.scopes]])
//!     → resolver.rs (compile once per config load)
//!
//! Per request:
//!     RequestMeta + live RequestIdentity
//!     → condition.rs (host / path / remote network / scheme)
//!     → cache.rs (results cached by domain until invalidated)
//!     → resolver.rs (merge matching scopes into a TrustConfig)
//! ```
//!
//! # Design Decisions
//! - Compiled resolver is immutable and shared across requests
//! - Condition results are per request; substituting the client identity
//!   invalidates the remote-ip and scheme domains so later lookups see the
//!   real client

pub mod cache;
pub mod condition;
pub mod resolver;

pub use cache::{CacheDomain, ConditionCache};
pub use condition::RequestMeta;
pub use resolver::{Resolution, ScopeResolver};
