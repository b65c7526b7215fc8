//! End-to-end supervisor tests against real listeners on `127.0.0.1`.
//!
//! Each test starts a supervisor with the built-in adapters, drives it over
//! HTTP with `reqwest`, and observes switches through the active-adapter
//! watch channel.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use janus_server::{
    wait_for_framework, ActiveFramework, Adapter, AdapterContext, AdapterError, AdapterRegistry,
    FailurePolicy, FrameworkOptions, ShutdownSignal, Supervisor, SupervisorError,
    SupervisorHandle,
};
use reqwest::StatusCode;
use serde_json::Value;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Reserves an ephemeral port and releases it for the adapter to bind.
fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn options(addr: SocketAddr) -> Arc<FrameworkOptions> {
    Arc::new(
        FrameworkOptions::builder()
            .listen_addr(addr.to_string())
            .shutdown_timeout(Duration::from_secs(2))
            .dashboard_enabled(true)
            .build(),
    )
}

/// A client that never reuses connections across a switch.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(TIMEOUT)
        .build()
        .unwrap()
}

async fn spawn(addr: SocketAddr, policy: FailurePolicy) -> SupervisorHandle {
    Supervisor::new(AdapterRegistry::with_defaults(), options(addr))
        .with_policy(policy)
        .spawn()
        .await
}

async fn wait_until(handle: &SupervisorHandle, framework: &str) -> ActiveFramework {
    let mut changes = handle.subscribe();
    tokio::time::timeout(TIMEOUT, wait_for_framework(&mut changes, framework))
        .await
        .expect("framework did not become active in time")
        .unwrap()
}

async fn get_json(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_switch_scenario_every_backend() {
    let addr = free_addr();
    let handle = spawn(addr, FailurePolicy::Resume).await;
    let client = client();
    let base = format!("http://{addr}");

    let order = ["hyper", "auto", "axum", "hyper"];
    handle.switch(order[0]).await.unwrap();
    wait_until(&handle, order[0]).await;

    for pair in order.windows(2) {
        let (from, to) = (pair[0], pair[1]);

        let (status, body) = get_json(&client, format!("{base}/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["framework"], from);
        assert_eq!(body["request"]["method"], "GET");
        assert_eq!(body["request"]["url"]["path"], "/");

        let (status, body) = get_json(&client, format!("{base}/framework?name={to}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["framework_previous"], from);
        assert_eq!(body["framework_current"], to);

        let active = wait_until(&handle, to).await;
        assert_eq!(active.local_addr, Some(addr));

        let (status, body) = get_json(&client, format!("{base}/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["framework"], to);
    }

    handle.shutdown();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_unknown_framework_is_rejected() {
    let addr = free_addr();
    let handle = spawn(addr, FailurePolicy::Resume).await;
    let client = client();

    handle.switch("axum").await.unwrap();
    let before = wait_until(&handle, "axum").await;

    let (status, body) = get_json(&client, format!("http://{addr}/framework?name=bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, _) = get_json(&client, format!("http://{addr}/framework")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(handle.active(), Some(before));
    let (_, body) = get_json(&client, format!("http://{addr}/")).await;
    assert_eq!(body["framework"], "axum");

    handle.shutdown();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_same_framework_does_not_switch() {
    let addr = free_addr();
    let handle = spawn(addr, FailurePolicy::Resume).await;
    let client = client();

    handle.switch("auto").await.unwrap();
    let before = wait_until(&handle, "auto").await;

    let (status, body) = get_json(&client, format!("http://{addr}/framework?name=auto")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["framework_previous"], "auto");
    assert_eq!(body["framework_current"], "auto");

    // Nothing was sent, so the same instance is still serving.
    assert_eq!(handle.active(), Some(before));

    handle.shutdown();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_log_level_survives_switch() {
    let addr = free_addr();
    let handle = spawn(addr, FailurePolicy::Resume).await;
    let client = client();
    let base = format!("http://{addr}");

    handle.switch("hyper").await.unwrap();
    wait_until(&handle, "hyper").await;

    let (_, body) = get_json(&client, format!("{base}/logger?level=debug")).await;
    assert_eq!(body["log_level_previous"], "info");
    assert_eq!(body["log_level_current"], "debug");

    handle.switch("axum").await.unwrap();
    wait_until(&handle, "axum").await;

    let (_, body) = get_json(&client, format!("{base}/logger?level=info")).await;
    assert_eq!(body["log_level_previous"], "debug");
    assert_eq!(body["log_level_current"], "info");

    let (_, body) = get_json(&client, format!("{base}/logger?level=loud")).await;
    assert_eq!(body["log_level_current"], "info");

    handle.shutdown();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_common_routes_on_every_backend() {
    let addr = free_addr();
    let handle = spawn(addr, FailurePolicy::Resume).await;
    let client = client();

    for framework in ["hyper", "auto", "axum"] {
        handle.switch(framework).await.unwrap();
        wait_until(&handle, framework).await;

        let (status, body) = get_json(&client, format!("http://{addr}/health")).await;
        assert_eq!(status, StatusCode::OK, "{framework}");
        assert_eq!(body["status"], "ok");

        let response = client.get(format!("http://{addr}/missing")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{framework}");

        let response = client.get(format!("http://{addr}/health")).send().await.unwrap();
        assert!(response.headers().contains_key("x-request-id"), "{framework}");

        let (status, body) = get_json(&client, format!("http://{addr}/debug/dashboard")).await;
        assert_eq!(status, StatusCode::OK, "{framework}");
        assert_eq!(body["framework"], framework);
    }

    handle.shutdown();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_releases_address_and_closes_channel() {
    let addr = free_addr();
    let shutdown = ShutdownSignal::new();
    let handle = Supervisor::new(AdapterRegistry::with_defaults(), options(addr))
        .with_shutdown(shutdown.clone())
        .spawn()
        .await;
    let commands = handle.commands().clone();

    handle.switch("hyper").await.unwrap();
    wait_until(&handle, "hyper").await;

    shutdown.trigger();
    handle.join().await.unwrap();

    assert!(commands.active().is_none());
    assert!(matches!(commands.send("axum").await, Err(SupervisorError::Closed)));
    assert!(client().get(format!("http://{addr}/health")).send().await.is_err());
    std::net::TcpListener::bind(addr).unwrap();
}

/// Adapter whose listener is always taken.
struct Unbindable {
    framework: String,
}

#[async_trait]
impl Adapter for Unbindable {
    fn framework(&self) -> &str {
        &self.framework
    }

    async fn start(&self) -> Result<(), AdapterError> {
        Err(AdapterError::Bind {
            addr: "127.0.0.1:0".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address already in use"),
        })
    }

    async fn stop(&self) {}

    fn is_running(&self) -> bool {
        false
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

#[tokio::test]
async fn test_bind_failure_resumes_previous() {
    let addr = free_addr();
    let mut registry = AdapterRegistry::with_defaults();
    registry.register("unbindable", |ctx: AdapterContext| -> Box<dyn Adapter> {
        Box::new(Unbindable {
            framework: ctx.framework().to_string(),
        })
    });
    let handle = Supervisor::new(registry, options(addr)).spawn().await;
    let client = client();

    handle.switch("hyper").await.unwrap();
    let first = wait_until(&handle, "hyper").await;

    let (status, _) = get_json(&client, format!("http://{addr}/framework?name=unbindable")).await;
    assert_eq!(status, StatusCode::OK);

    let mut changes = handle.subscribe();
    let resumed = tokio::time::timeout(
        TIMEOUT,
        changes.wait_for(|a| a.as_ref().is_some_and(|a| a.token != first.token)),
    )
    .await
    .unwrap()
    .unwrap()
    .clone()
    .unwrap();
    assert_eq!(resumed.framework, "hyper");
    assert!(resumed.token.generation > first.token.generation + 1);

    let (_, body) = get_json(&client, format!("http://{addr}/")).await;
    assert_eq!(body["framework"], "hyper");

    handle.shutdown();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_initial_bind_failure_exits_under_fail_fast() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap();
    let handle = spawn(addr, FailurePolicy::Exit).await;

    handle.switch("hyper").await.unwrap();

    let result = tokio::time::timeout(TIMEOUT, handle.join()).await.unwrap();
    assert!(matches!(
        result,
        Err(SupervisorError::Start { framework, .. }) if framework == "hyper"
    ));
    drop(occupied);
}

#[tokio::test]
async fn test_stale_token_rejected_after_switch() {
    let addr = free_addr();
    let handle = spawn(addr, FailurePolicy::Resume).await;

    handle.switch("hyper").await.unwrap();
    let first = wait_until(&handle, "hyper").await;
    handle.switch("auto").await.unwrap();
    let second = wait_until(&handle, "auto").await;

    let err = handle.switch_as(first.token, "axum").await.unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::StaleHandle { token, current: Some(current) }
            if token == first.token.generation && current == second.token.generation
    ));
    assert_eq!(handle.active(), Some(second));

    handle.shutdown();
    handle.join().await.unwrap();
}
