//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main fires the server's shutdown future
//!     → Stop accepting → Drain in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - Config reload is driven by the file watcher, not SIGHUP
//! - Shutdown has timeout: forced exit after deadline

pub mod signals;

pub use signals::wait_for_signal;
