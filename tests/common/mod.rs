//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use forwarded_identity::config::{parse_config, ServerConfig};
use forwarded_identity::HttpServer;

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub config_tx: mpsc::UnboundedSender<ServerConfig>,
    stop_tx: oneshot::Sender<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Begin graceful shutdown.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
    }
}

/// Start a server from TOML config text.
pub async fn spawn_server(toml: &str) -> TestServer {
    let config = parse_config(toml).unwrap();
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let stop = async move {
        let _ = stop_rx.await;
    };
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, stop).await;
    });

    TestServer {
        addr,
        config_tx,
        stop_tx,
    }
}

/// GET `url` and decode the echoed identity.
pub async fn get_identity(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
) -> serde_json::Value {
    let mut req = client.get(url);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    let res = req.send().await.unwrap();
    assert!(res.status().is_success(), "status {}", res.status());
    res.json().await.unwrap()
}

/// Poll until `check` passes or the deadline expires.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
