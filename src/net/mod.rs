//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → axum::serve accept loop
//!     → connection.rs (ConnectionInfo: id, socket peer)
//!     → attached to every request as ConnectInfo<ConnectionInfo>
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - The socket peer is recorded once and never rewritten
//! - Connection close is observed when the last clone of its info drops

pub mod connection;

pub use connection::{ConnectionId, ConnectionInfo};
