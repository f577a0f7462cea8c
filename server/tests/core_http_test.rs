//! HTTP Integration Tests for Core Administration
//!
//! Liveness, configuration and backup access, system logs and health
//! snapshots.
//!
//! Run with: `cargo test --test core_http_test -- --ignored`

mod helpers;

use axum::body::Body;
use axum::http::Method;
use helpers::{body_to_json, id_of, make_officer, member_with_token, TestApp};
use lodge_server::permissions::OfficerRoleCode;
use serde_json::json;
use serial_test::serial;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_liveness_is_public() {
    let app = TestApp::new().await;
    let req = TestApp::request(Method::GET, "/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));
    let body = body_to_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_configuration_is_worshipful_master_only() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (_, master) = member_with_token(&app, &mut guard, 3).await;
    let (vm_id, vm) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, vm_id, OfficerRoleCode::Vm).await;

    let uri = "/api/core/configuration/current";
    assert_eq!(app.send(Method::GET, uri, &master, None).await.status(), 403);
    assert_eq!(
        app.send(Method::GET, "/api/core/backups", &master, None).await.status(),
        403
    );

    let resp = app.send(Method::GET, uri, &vm, None).await;
    assert_eq!(resp.status(), 200);
    let config = body_to_json(resp).await;
    assert!(config["calendar_start_month"].as_i64().is_some());

    let resp = app
        .send(Method::PUT, uri, &vm, Some(json!({ "primary_color": "azul" })))
        .await;
    assert_eq!(resp.status(), 400);
    let resp = app
        .send(Method::PUT, uri, &vm, Some(json!({ "calendar_start_month": 13 })))
        .await;
    assert_eq!(resp.status(), 400);

    assert_eq!(
        app.send(Method::GET, "/api/core/backups", &vm, None).await.status(),
        200
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_logs_and_health_require_master_degree() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (_, fellow) = member_with_token(&app, &mut guard, 2).await;
    let (_, master) = member_with_token(&app, &mut guard, 3).await;

    for uri in ["/api/core/logs", "/api/core/health", "/api/core/health/summary"] {
        assert_eq!(app.send(Method::GET, uri, &fellow, None).await.status(), 403, "{uri}");
    }

    let resp = app
        .send(
            Method::POST,
            "/api/core/logs/add_log",
            &master,
            Some(json!({
                "log_type": "warning",
                "module": "treasury",
                "message": "Conciliación bancaria pendiente"
            })),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let log_id = id_of(&body_to_json(resp).await);
    guard.delete_row("system_logs", log_id);

    let resp = app
        .send(Method::GET, &format!("/api/core/logs/{log_id}"), &master, None)
        .await;
    let log = body_to_json(resp).await;
    assert_eq!(log["log_type"], "warning");
    assert_eq!(log["module"], "treasury");

    let resp = app
        .send(Method::GET, "/api/core/health/current", &master, None)
        .await;
    assert_eq!(resp.status(), 200);
    let snapshot = body_to_json(resp).await;
    guard.delete_row("system_health", id_of(&snapshot));
    assert!(["healthy", "warning", "critical"].contains(&snapshot["status"].as_str().unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_failed_login_is_logged() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (_, master) = member_with_token(&app, &mut guard, 3).await;

    let username = format!("ghost_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let req = TestApp::request(Method::POST, "/api/auth/token/")
        .header("Content-Type", "application/json")
        .header("User-Agent", "core-http-test")
        .body(Body::from(
            json!({ "username": username, "password": "x" }).to_string(),
        ))
        .unwrap();
    assert_eq!(app.oneshot(req).await.status(), 401);

    let resp = app
        .send(
            Method::GET,
            &format!("/api/core/logs?log_type=security&search={username}"),
            &master,
            None,
        )
        .await;
    let page = body_to_json(resp).await;
    assert_eq!(page["total"], 1);
    let log = &page["items"][0];
    assert_eq!(log["module"], "auth");
    assert_eq!(log["user_agent"], "core-http-test");
    guard.delete_row("system_logs", id_of(log));
}
