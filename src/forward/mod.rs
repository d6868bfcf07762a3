//! Forwarded client identity subsystem.
//!
//! # Data Flow
//! ```text
//! Request headers available
//!     → lifecycle.rs (pick forwarding header, check socket peer)
//!     → chain.rs (tokenize header value)
//!     → trust.rs (walk chain right to left, find real client)
//!     → resolve.rs (numeric-only address parse)
//!     → identity.rs (apply: save + overwrite identity)
//!     → ... downstream handlers see the real client ...
//!     → identity.rs (restore on completion or reset)
//! ```
//!
//! # Design Decisions
//! - Attacker-controlled header text is only believed when the socket peer is
//!   a trusted proxy
//! - Every failure degrades to the original, unforwarded identity
//! - Restore runs on every exit path and is idempotent

pub mod chain;
pub mod identity;
pub mod lifecycle;
pub mod resolve;
pub mod trust;

pub use chain::{extract, AddressChain};
pub use identity::{RequestIdentity, RequestState, SubstitutionRecord};
pub use lifecycle::{handle_connection_reset, handle_request_done, handle_request_headers, Outcome};
pub use resolve::{resolve_numeric, AddressParseError};
pub use trust::{TrustConfig, Verdict};
