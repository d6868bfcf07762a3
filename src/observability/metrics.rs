//! Metrics collection and exposition.
//!
//! # Metrics
//! - `forwarded_identity_outcomes_total` (counter): lifecycle outcome per request
//! - `forwarded_identity_restores_total` (counter): restores by path
//! - `forwarded_identity_active_connections` (gauge): open client connections
//!
//! All recording functions are no-ops until `init_metrics` installs the
//! Prometheus recorder.

use std::net::SocketAddr;

use ::metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::forward::lifecycle::{Outcome, RestorePath};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics endpoint listening");
    Ok(())
}

pub fn record_outcome(outcome: &Outcome) {
    counter!("forwarded_identity_outcomes_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_restore(path: RestorePath) {
    counter!("forwarded_identity_restores_total", "path" => path.as_str()).increment(1);
}

pub fn record_connection_opened() {
    gauge!("forwarded_identity_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    gauge!("forwarded_identity_active_connections").decrement(1.0);
}
