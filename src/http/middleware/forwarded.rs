//! Forwarded client identity middleware.
//!
//! Binds the request lifecycle hooks of `forward::lifecycle` to a tower
//! service:
//! - before the inner service runs: resolve scopes, apply the forwarded
//!   client, publish a `ClientIdentity` extension for handlers
//! - when the response future completes: restore (request done)
//! - when the response future is dropped early (client gone, timeout,
//!   shutdown): restore (connection reset)

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{connect_info::MockConnectInfo, ConnectInfo},
    http::{header::HOST, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use serde::Serialize;
use tower::{Layer, Service};

use crate::forward::identity::{RequestIdentity, RequestState};
use crate::forward::lifecycle::{self, Outcome, RestorePath};
use crate::net::{ConnectionId, ConnectionInfo};
use crate::observability::metrics;
use crate::scope::{RequestMeta, ScopeResolver};

/// The client a request is attributed to, as seen by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientIdentity {
    /// Effective client address (forwarded client or socket peer).
    pub address: SocketAddr,
    pub address_text: String,
    pub scheme: String,
    /// Socket peer the request actually arrived from.
    pub peer: SocketAddr,
    /// Whether `address` came from a forwarding header.
    pub forwarded: bool,
    /// Scopes matching the effective identity.
    pub scopes: Vec<String>,
}

/// Layer applying [`ForwardedService`].
#[derive(Clone)]
pub struct ForwardedLayer {
    resolver: Arc<ArcSwap<ScopeResolver>>,
    default_scheme: Arc<str>,
}

impl ForwardedLayer {
    /// `resolver` may be swapped at any time; each request uses the snapshot
    /// current when it arrived.
    pub fn new(resolver: Arc<ArcSwap<ScopeResolver>>, default_scheme: &str) -> Self {
        Self {
            resolver,
            default_scheme: Arc::from(default_scheme.to_ascii_lowercase()),
        }
    }
}

impl<S> Layer<S> for ForwardedLayer {
    type Service = ForwardedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ForwardedService {
            inner,
            resolver: Arc::clone(&self.resolver),
            default_scheme: Arc::clone(&self.default_scheme),
        }
    }
}

/// Substitutes the forwarded client for the duration of one request.
#[derive(Clone)]
pub struct ForwardedService<S> {
    inner: S,
    resolver: Arc<ArcSwap<ScopeResolver>>,
    default_scheme: Arc<str>,
}

/// Owns the request state while the inner service runs and restores it on
/// every exit path.
struct RestoreGuard {
    state: RequestState,
    connection_id: ConnectionId,
    done: bool,
}

impl RestoreGuard {
    fn new(state: RequestState, connection_id: ConnectionId) -> Self {
        Self {
            state,
            connection_id,
            done: false,
        }
    }

    fn complete(mut self) -> RequestIdentity {
        if lifecycle::handle_request_done(&mut self.state) {
            metrics::record_restore(RestorePath::RequestDone);
        }
        self.done = true;
        self.state.identity().clone()
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if lifecycle::handle_connection_reset(&mut self.state) {
            metrics::record_restore(RestorePath::ConnectionReset);
            tracing::debug!(
                connection_id = %self.connection_id,
                "request aborted, identity restored"
            );
        }
    }
}

fn request_meta(req: &Request<Body>) -> RequestMeta {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().host().map(str::to_string));

    RequestMeta {
        host,
        path: req.uri().path().to_string(),
    }
}

/// Connection info attached by `into_make_service_with_connect_info`, or by
/// `MockConnectInfo` when the router is driven without a listener.
fn connection_info(req: &Request<Body>) -> Option<ConnectionInfo> {
    let extensions = req.extensions();
    extensions
        .get::<ConnectInfo<ConnectionInfo>>()
        .map(|ConnectInfo(conn)| conn.clone())
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<ConnectionInfo>>()
                .map(|MockConnectInfo(conn)| conn.clone())
        })
}

impl<S> Service<Request<Body>> for ForwardedService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let Some(conn) = connection_info(&req) else {
            tracing::error!(
                uri = %req.uri(),
                "request has no connection info, serve with into_make_service_with_connect_info"
            );
            let response =
                (StatusCode::INTERNAL_SERVER_ERROR, "client address unavailable").into_response();
            return Box::pin(async move { Ok(response) });
        };

        let resolver = self.resolver.load_full();
        let meta = request_meta(&req);
        let scheme = req
            .uri()
            .scheme_str()
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| self.default_scheme.to_string());
        let mut state = RequestState::new(RequestIdentity::from_peer(conn.peer(), scheme));

        let outcome = {
            let resolution = resolver.resolve(&meta, &mut state);
            lifecycle::handle_request_headers(&resolution.trust, &mut state, req.headers())
        };
        metrics::record_outcome(&outcome);
        if let Outcome::Substituted { client, scheme_changed } = &outcome {
            tracing::debug!(
                connection_id = %conn.id(),
                peer = %conn.peer(),
                %client,
                scheme_changed,
                "using forwarded client address"
            );
        }

        // scope decisions downstream are made against the substituted identity
        let scopes = resolver
            .resolve(&meta, &mut state)
            .matched
            .into_iter()
            .map(str::to_string)
            .collect();

        let identity = state.identity();
        req.extensions_mut().insert(ClientIdentity {
            address: identity.remote_address,
            address_text: identity.remote_address_text.clone(),
            scheme: identity.scheme.clone(),
            peer: conn.peer(),
            forwarded: state.is_substituted(),
            scopes,
        });

        let guard = RestoreGuard::new(state, conn.id());
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(req).await;
            guard.complete();
            response
        })
    }
}
