//! HTTP Integration Tests for User Management
//!
//! Staff-only account creation and the officer role cascade: group
//! membership follows the role, granted codenames stay.
//!
//! Run with: `cargo test --test users_http_test -- --ignored`

mod helpers;

use axum::http::Method;
use helpers::{body_to_json, id_of, make_staff, member_with_token, TestApp, TEST_PASSWORD};
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

fn has_codename(me: &Value, codename: &str) -> bool {
    me["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == codename)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_create_user_runs_cascade() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (_, member) = member_with_token(&app, &mut guard, 3).await;
    let (staff_id, staff) = member_with_token(&app, &mut guard, 3).await;
    make_staff(&app.pool, staff_id).await;

    let username = format!("nuevo_{}", &Uuid::new_v4().to_string()[..8]);
    let body = json!({
        "username": username,
        "email": format!("{username}@example.org"),
        "password": TEST_PASSWORD,
        "symbolic_name": "Pitágoras",
    });

    let resp = app
        .send(Method::POST, "/api/auth/users/", &member, Some(body.clone()))
        .await;
    assert_eq!(resp.status(), 403);

    let short = json!({
        "username": username,
        "email": format!("{username}@example.org"),
        "password": "corta",
    });
    let resp = app.send(Method::POST, "/api/auth/users/", &staff, Some(short)).await;
    assert_eq!(resp.status(), 400);

    let resp = app
        .send(Method::POST, "/api/auth/users/", &staff, Some(body.clone()))
        .await;
    assert_eq!(resp.status(), 201);
    let user = body_to_json(resp).await;
    let user_id = id_of(&user);
    guard.delete_user(user_id);
    assert_eq!(user["degree"], 1);
    assert_eq!(user["degree_name"], "Aprendiz");

    let resp = app.send(Method::POST, "/api/auth/users/", &staff, Some(body)).await;
    assert_eq!(resp.status(), 409);

    // The new member has the basic codenames and an empty profile.
    let token = helpers::generate_access_token(&app.config, user_id);
    let me = body_to_json(app.send(Method::GET, "/api/auth/users/me/", &token, None).await).await;
    for codename in ["view_memberprofile", "view_event", "view_notification"] {
        assert!(has_codename(&me, codename), "{codename}");
    }
    assert!(!has_codename(&me, "add_event"));

    let detail = body_to_json(
        app.send(Method::GET, &format!("/api/members/members/{user_id}"), &staff, None)
            .await,
    )
    .await;
    assert_eq!(detail["profile"]["attendance_count"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_officer_role_cascade() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (staff_id, staff) = member_with_token(&app, &mut guard, 3).await;
    make_staff(&app.pool, staff_id).await;
    let (officer_id, officer) = member_with_token(&app, &mut guard, 3).await;
    let (_, bystander) = member_with_token(&app, &mut guard, 3).await;

    let uri = format!("/api/auth/users/{officer_id}/officer-role");
    assert_eq!(app.send(Method::GET, &uri, &staff, None).await.status(), 404);

    let role = |code: &str, active: bool| {
        json!({ "role": code, "start_date": "2025-01-01", "is_active": active })
    };

    assert_eq!(
        app.send(Method::PUT, &uri, &bystander, Some(role("SEC", true))).await.status(),
        403
    );
    let resp = app
        .send(
            Method::PUT,
            &uri,
            &staff,
            Some(json!({
                "role": "SEC",
                "start_date": "2025-06-01",
                "end_date": "2025-01-01",
                "is_active": true
            })),
        )
        .await;
    assert_eq!(resp.status(), 400);

    let resp = app.send(Method::PUT, &uri, &staff, Some(role("SEC", true))).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_to_json(resp).await["role"], "SEC");

    let me = body_to_json(app.send(Method::GET, "/api/auth/users/me/", &officer, None).await).await;
    assert_eq!(me["groups"], json!(["Secretario"]));
    assert_eq!(me["access"]["is_secretary"], true);
    assert!(has_codename(&me, "add_event"));
    assert!(has_codename(&me, "change_ritualminutes"));

    // Switching roles moves the group and adds the new codenames.
    let resp = app.send(Method::PUT, &uri, &staff, Some(role("TES", true))).await;
    assert_eq!(resp.status(), 200);
    let me = body_to_json(app.send(Method::GET, "/api/auth/users/me/", &officer, None).await).await;
    assert_eq!(me["groups"], json!(["Tesorero"]));
    assert_eq!(me["access"]["is_treasurer"], true);
    assert_eq!(me["access"]["is_secretary"], false);
    assert!(has_codename(&me, "add_payment"));
    assert!(has_codename(&me, "add_event"), "codenames are additive");

    // An inactive role clears the groups and the role flags.
    let resp = app.send(Method::PUT, &uri, &staff, Some(role("TES", false))).await;
    assert_eq!(resp.status(), 200);
    let me = body_to_json(app.send(Method::GET, "/api/auth/users/me/", &officer, None).await).await;
    assert_eq!(me["groups"], json!([]));
    assert_eq!(me["access"]["is_officer"], false);

    // Removing the role keeps the codenames already granted.
    app.send(Method::PUT, &uri, &staff, Some(role("VM", true))).await;
    assert_eq!(app.send(Method::DELETE, &uri, &bystander, None).await.status(), 403);
    assert_eq!(app.send(Method::DELETE, &uri, &staff, None).await.status(), 204);
    assert_eq!(app.send(Method::DELETE, &uri, &staff, None).await.status(), 404);

    let me = body_to_json(app.send(Method::GET, "/api/auth/users/me/", &officer, None).await).await;
    assert_eq!(me["groups"], json!([]));
    assert_eq!(me["access"]["is_worshipful_master"], false);
    assert!(me["officer_role"].is_null());
    assert!(has_codename(&me, "approve_ritualplan"));
    assert!(has_codename(&me, "add_payment"));
    assert_eq!(app.send(Method::GET, &uri, &staff, None).await.status(), 404);
}
