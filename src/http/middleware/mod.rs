//! Tower middleware applied in front of every handler.

pub mod forwarded;

pub use forwarded::{ClientIdentity, ForwardedLayer, ForwardedService};
