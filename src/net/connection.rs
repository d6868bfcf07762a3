//! Per-connection identity and lifetime tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Capture the socket peer when a connection is accepted
//! - Log and count connection close once the last request handle is gone
//!
//! The socket peer captured here is never modified. Forwarded client
//! substitution works on a per-request copy (see `forward::identity`).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::connect_info::Connected;
use axum::serve::IncomingStream;
use tokio::net::TcpListener;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lives as long as any request of the connection can still run.
#[derive(Debug)]
struct ConnectionGuard {
    id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::record_connection_closed();
        tracing::trace!(connection_id = %self.id, "connection closed");
    }
}

/// What the server knows about the transport a request arrived on.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    id: ConnectionId,
    peer: SocketAddr,
    _guard: Arc<ConnectionGuard>,
}

impl ConnectionInfo {
    pub fn new(peer: SocketAddr) -> Self {
        let id = ConnectionId::new();
        metrics::record_connection_opened();
        tracing::trace!(connection_id = %id, %peer, "connection accepted");
        Self {
            id,
            peer,
            _guard: Arc::new(ConnectionGuard { id }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Socket peer address, i.e. the nearest proxy when behind one.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Connected<IncomingStream<'_, TcpListener>> for ConnectionInfo {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        Self::new(*stream.remote_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn clones_share_the_connection() {
        let info = ConnectionInfo::new("10.0.0.232:40000".parse().unwrap());
        let copy = info.clone();
        assert_eq!(info.id(), copy.id());
        assert_eq!(copy.peer().to_string(), "10.0.0.232:40000");
        assert_eq!(info.id().to_string(), format!("conn-{}", info.id().as_u64()));
    }
}
