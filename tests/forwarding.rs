//! End-to-end forwarded identity behavior over real TCP connections.

use serde_json::json;

use forwarded_identity::config::parse_config;

mod common;

const TRUST_LOOPBACK: &str = r#"
[forwarding.forwarder]
"127.0.0.1" = "trust"
"#;

#[tokio::test]
async fn trusted_peer_gets_forwarded_client() {
    let server = common::spawn_server(TRUST_LOOPBACK).await;
    let client = reqwest::Client::new();

    let body = common::get_identity(
        &client,
        &server.url("/whoami"),
        &[
            ("X-Forwarded-For", "198.51.100.7, 127.0.0.1"),
            ("X-Forwarded-Proto", "https"),
        ],
    )
    .await;

    assert_eq!(body["address_text"], "198.51.100.7");
    assert_eq!(body["scheme"], "https");
    assert_eq!(body["forwarded"], true);

    server.stop();
}

#[tokio::test]
async fn untrusted_peer_is_ignored() {
    let server = common::spawn_server(
        r#"
        [forwarding.forwarder]
        "10.0.0.1" = "trust"
        "#,
    )
    .await;
    let client = reqwest::Client::new();

    let xff = [("X-Forwarded-For", "198.51.100.7")];
    let body = common::get_identity(&client, &server.url("/"), &xff).await;

    assert_eq!(body["address_text"], "127.0.0.1");
    assert_eq!(body["scheme"], "http");
    assert_eq!(body["forwarded"], false);

    server.stop();
}

#[tokio::test]
async fn identity_restored_between_requests_on_one_connection() {
    let server = common::spawn_server(TRUST_LOOPBACK).await;
    // a single pooled keep-alive connection
    let client = reqwest::Client::builder().pool_max_idle_per_host(1).build().unwrap();

    let xff = [("X-Forwarded-For", "198.51.100.7")];
    let first = common::get_identity(&client, &server.url("/"), &xff).await;
    assert_eq!(first["address_text"], "198.51.100.7");

    let second = common::get_identity(&client, &server.url("/"), &[]).await;
    assert_eq!(second["address_text"], "127.0.0.1");
    assert_eq!(second["forwarded"], false);

    server.stop();
}

#[tokio::test]
async fn forwarded_header_used_when_configured() {
    let server = common::spawn_server(
        r#"
        [forwarding]
        headers = ["Forwarded"]

        [forwarding.forwarder]
        "127.0.0.1" = "trust"
        "#,
    )
    .await;
    let client = reqwest::Client::new();

    let body = common::get_identity(
        &client,
        &server.url("/"),
        &[
            ("X-Forwarded-For", "203.0.113.9"),
            ("Forwarded", "for=198.51.100.7;proto=https"),
        ],
    )
    .await;

    // X-Forwarded-For is not in the configured list
    assert_eq!(body["address_text"], "198.51.100.7");
    // scheme only changes via X-Forwarded-Proto
    assert_eq!(body["scheme"], "http");

    server.stop();
}

#[tokio::test]
async fn scopes_override_trust_per_path() {
    let server = common::spawn_server(
        r#"
        [forwarding.forwarder]
        "127.0.0.1" = "trust"

        [[forwarding.scopes]]
        name = "internal"
        path_prefix = "/internal"
        forwarder = { "127.0.0.1" = "deny" }
        "#,
    )
    .await;
    let client = reqwest::Client::new();
    let xff = [("X-Forwarded-For", "198.51.100.7")];

    let public = common::get_identity(&client, &server.url("/public"), &xff).await;
    assert_eq!(public["address_text"], "198.51.100.7");
    assert_eq!(public["scopes"], json!([]));

    let internal = common::get_identity(&client, &server.url("/internal/stats"), &xff).await;
    assert_eq!(internal["address_text"], "127.0.0.1");
    assert_eq!(internal["scopes"], json!(["internal"]));

    server.stop();
}

#[tokio::test]
async fn reloaded_rules_apply_to_new_requests() {
    let server = common::spawn_server("").await;
    let client = reqwest::Client::new();
    let xff = [("X-Forwarded-For", "198.51.100.7")];

    let before = common::get_identity(&client, &server.url("/"), &xff).await;
    assert_eq!(before["forwarded"], false);

    server.config_tx.send(parse_config(TRUST_LOOPBACK).unwrap()).unwrap();

    let url = server.url("/");
    common::eventually(|| {
        let client = client.clone();
        let url = url.clone();
        async move {
            let body = common::get_identity(&client, &url, &xff).await;
            body["forwarded"] == true
        }
    })
    .await;

    server.stop();
}

#[tokio::test]
async fn stop_closes_the_listener() {
    let server = common::spawn_server(TRUST_LOOPBACK).await;
    let url = server.url("/");
    let client = reqwest::Client::builder().pool_max_idle_per_host(0).build().unwrap();

    common::get_identity(&client, &url, &[]).await;
    server.stop();

    common::eventually(|| {
        let client = client.clone();
        let url = url.clone();
        async move { client.get(&url).send().await.is_err() }
    })
    .await;
}
