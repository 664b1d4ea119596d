use super::*;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

type Seen = Arc<Mutex<Vec<(String, Value)>>>;

async fn capture(
    State(seen): State<Seen>,
    Path(endpoint): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    seen.lock().unwrap().push((endpoint, body));
    StatusCode::OK
}

/// Start a mock manager; returns its base url and the captured reports.
async fn spawn_manager() -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/internal/{endpoint}", post(capture))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

#[tokio::test]
async fn register_posts_account_and_pid() {
    let (base, seen) = spawn_manager().await;
    let reporter = Reporter::new(Some(format!("{base}/")), "acct-1");

    assert!(reporter.register().await);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "register");
    assert_eq!(seen[0].1["accountId"], "acct-1");
    assert_eq!(seen[0].1["pid"], std::process::id());
}

#[tokio::test]
async fn status_carries_session_snapshot() {
    let (base, seen) = spawn_manager().await;
    let reporter = Reporter::new(Some(base), "acct-1");
    let state = SessionState {
        gid: 42,
        name: "farmer".to_owned(),
        level: 5,
        gold: 1000,
        exp: 300,
        server_time_offset_ms: 0,
    };

    reporter.status(&state).await;
    reporter.online(true).await;
    reporter.log("info", "harvested 3 lands").await;

    let seen = seen.lock().unwrap();
    let endpoints: Vec<&str> = seen.iter().map(|(endpoint, _)| endpoint.as_str()).collect();
    assert_eq!(endpoints, ["status", "online", "log"]);
    assert_eq!(seen[0].1["data"]["gid"], 42);
    assert_eq!(seen[0].1["data"]["gold"], 1000);
    assert_eq!(seen[1].1["online"], true);
    assert_eq!(seen[2].1["level"], "info");
    assert_eq!(seen[2].1["message"], "harvested 3 lands");
}

#[tokio::test]
async fn rejected_register_returns_false() {
    let app = Router::new().route("/api/internal/{endpoint}", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let reporter = Reporter::new(Some(format!("http://{addr}")), "acct-1");
    assert!(!reporter.register().await);
}

#[tokio::test]
async fn unreachable_manager_is_ignored() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let reporter = Reporter::new(Some(format!("http://{addr}")), "acct-1");
    assert!(!reporter.register().await);
    reporter.heartbeat().await;
}

#[tokio::test]
async fn disabled_reporter_sends_nothing() {
    let reporter = Reporter::new(None, "acct-1");
    assert!(!reporter.is_enabled());
    assert!(!reporter.register().await);
    reporter.online(false).await;

    assert!(!Reporter::new(Some(String::new()), "acct-1").is_enabled());
}
