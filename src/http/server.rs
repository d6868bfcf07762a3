//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the echo handler
//! - Wire up middleware (forwarded identity, timeout, tracing)
//! - Serve with per-connection info so the socket peer is known
//! - Apply forwarding config reloads without restarting
//! - Stop accepting and drain when the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{routing::any, Extension, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ServerConfig, ValidationError};
use crate::http::middleware::forwarded::{ClientIdentity, ForwardedLayer};
use crate::net::ConnectionInfo;
use crate::scope::ScopeResolver;

/// HTTP server reporting the effective client identity of each request.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    resolver: Arc<ArcSwap<ScopeResolver>>,
}

impl HttpServer {
    /// Compiles the forwarding rules and builds the router.
    pub fn new(config: ServerConfig) -> Result<Self, ValidationError> {
        let resolver = ScopeResolver::from_config(&config.forwarding)?;
        let resolver = Arc::new(ArcSwap::from_pointee(resolver));
        let router = Self::build_router(&config, Arc::clone(&resolver));

        Ok(Self {
            router,
            config,
            resolver,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, resolver: Arc<ArcSwap<ScopeResolver>>) -> Router {
        Router::new()
            .route("/{*path}", any(echo_handler))
            .route("/", any(echo_handler))
            .layer(ForwardedLayer::new(resolver, &config.listener.scheme))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    ///
    /// Every config received on `config_updates` replaces the forwarding
    /// rules; a config whose rules fail to compile is logged and skipped.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            scopes = self.resolver.load().scope_count(),
            "HTTP server starting"
        );

        let resolver = Arc::clone(&self.resolver);
        let reload = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match ScopeResolver::from_config(&config.forwarding) {
                    Ok(next) => {
                        let scopes = next.scope_count();
                        resolver.store(Arc::new(next));
                        tracing::info!(scopes, "forwarding rules reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "rejected forwarding rules, keeping previous");
                    }
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<ConnectionInfo>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received, draining");
            })
            .await?;

        reload.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle to the live forwarding rules.
    pub fn resolver(&self) -> Arc<ArcSwap<ScopeResolver>> {
        Arc::clone(&self.resolver)
    }
}

/// Reports the identity the request is attributed to.
async fn echo_handler(Extension(client): Extension<ClientIdentity>) -> Json<ClientIdentity> {
    Json(client)
}
