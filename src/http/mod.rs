//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (ConnectInfo<ConnectionInfo>)
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → middleware/forwarded.rs (resolve scopes, substitute forwarded client)
//!     → echo handler (reports ClientIdentity as JSON)
//!     → middleware/forwarded.rs (restore socket identity)
//!     → Send to client
//! ```

pub mod middleware;
pub mod server;

pub use middleware::{ClientIdentity, ForwardedLayer};
pub use server::HttpServer;
