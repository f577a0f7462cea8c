//! HTTP Integration Tests for Ritual Plans
//!
//! Plan creation with its calendar event, degree gating, role assignment and
//! the minutes approval workflow.
//!
//! Run with: `cargo test --test rituals_http_test -- --ignored`

mod helpers;

use axum::http::Method;
use helpers::{body_to_json, id_of, make_officer, member_with_token, TestApp};
use lodge_server::permissions::OfficerRoleCode;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

fn plan_body(title: &str, degree: i16) -> serde_json::Value {
    json!({
        "title": title,
        "description": "Tenida de instrucción",
        "date": "2030-06-24",
        "start_time": "19:30:00",
        "end_time": "22:00:00",
        "ritual_type": "regular",
        "degree": degree,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_plan_creates_event_and_respects_degree() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (master_id, master) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, master_id, OfficerRoleCode::Vm).await;
    let (_, apprentice) = member_with_token(&app, &mut guard, 1).await;
    let (_, fellow) = member_with_token(&app, &mut guard, 2).await;

    let title = format!("Aumento de salario {}", &Uuid::new_v4().to_string()[..6]);
    let resp = app
        .send(Method::POST, "/api/rituals/plans/", &master, Some(plan_body(&title, 2)))
        .await;
    assert_eq!(resp.status(), 201);
    let plan = body_to_json(resp).await;
    let plan_id = id_of(&plan);
    let event_id: Uuid = plan["event_id"].as_str().unwrap().parse().unwrap();
    guard.delete_row("ritual_plans", plan_id);
    guard.delete_row("events", event_id);
    assert_eq!(plan["status"], "draft");

    let uri = format!("/api/rituals/plans/{plan_id}");
    assert_eq!(app.send(Method::GET, &uri, &fellow, None).await.status(), 200);
    assert_eq!(app.send(Method::GET, &uri, &apprentice, None).await.status(), 404);

    // The generated event was announced to members of the plan's degree.
    let resp = app
        .send(Method::GET, "/api/communications/notifications/", &fellow, None)
        .await;
    let page = body_to_json(resp).await;
    let expected = format!("Nuevo evento: Trabajo Ritual: {title}");
    assert!(page["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["title"] == expected));

    let resp = app
        .send(Method::GET, "/api/communications/notifications/", &apprentice, None)
        .await;
    let page = body_to_json(resp).await;
    assert!(!page["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["title"] == expected));

    // Apprentices cannot create plans either.
    let resp = app
        .send(Method::POST, "/api/rituals/plans/", &apprentice, Some(plan_body("x", 1)))
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_role_assignment_and_confirmation() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (master_id, master) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, master_id, OfficerRoleCode::Vm).await;
    let (orator_id, orator) = member_with_token(&app, &mut guard, 3).await;
    let (_, bystander) = member_with_token(&app, &mut guard, 3).await;

    let resp = app
        .send(Method::POST, "/api/rituals/plans/", &master, Some(plan_body("Iniciación", 1)))
        .await;
    let plan = body_to_json(resp).await;
    let plan_id = id_of(&plan);
    guard.delete_row("ritual_plans", plan_id);
    if let Some(event_id) = plan["event_id"].as_str().and_then(|s| s.parse().ok()) {
        guard.delete_row("events", event_id);
    }

    let resp = app
        .send(
            Method::POST,
            &format!("/api/rituals/plans/{plan_id}/add_role"),
            &master,
            Some(json!({ "role_type": "ora" })),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let role_id = id_of(&body_to_json(resp).await);

    let assign = format!("/api/rituals/roles/{role_id}/assign");
    let resp = app.send(Method::POST, &assign, &master, Some(json!({}))).await;
    assert_eq!(resp.status(), 400, "user_id is required");
    let resp = app
        .send(Method::POST, &assign, &master, Some(json!({ "user_id": Uuid::new_v4() })))
        .await;
    assert_eq!(resp.status(), 404);
    let resp = app
        .send(Method::POST, &assign, &master, Some(json!({ "user_id": orator_id })))
        .await;
    assert_eq!(resp.status(), 200);

    let confirm = format!("/api/rituals/roles/{role_id}/confirm");
    assert_eq!(app.send(Method::POST, &confirm, &bystander, None).await.status(), 403);
    assert_eq!(app.send(Method::POST, &confirm, &orator, None).await.status(), 200);

    let resp = app
        .send(Method::GET, &format!("/api/rituals/roles/{role_id}"), &orator, None)
        .await;
    let role = body_to_json(resp).await;
    assert_eq!(role["is_confirmed"], true);
    assert_eq!(role["assigned_to"], orator_id.to_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_minutes_approval_completes_plan() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (master_id, master) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, master_id, OfficerRoleCode::Vm).await;
    let (secretary_id, secretary) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, secretary_id, OfficerRoleCode::Sec).await;

    let resp = app
        .send(Method::POST, "/api/rituals/plans/", &master, Some(plan_body("Tenida ordinaria", 1)))
        .await;
    let plan = body_to_json(resp).await;
    let plan_id = id_of(&plan);
    guard.delete_row("ritual_plans", plan_id);
    if let Some(event_id) = plan["event_id"].as_str().and_then(|s| s.parse().ok()) {
        guard.delete_row("events", event_id);
    }

    let minutes = json!({
        "ritual_plan_id": plan_id,
        "content": "Se abrieron los trabajos a las 19:30.",
        "attendance_count": 23,
        "visitors_count": 2
    });
    let resp = app
        .send(Method::POST, "/api/rituals/minutes/", &secretary, Some(minutes.clone()))
        .await;
    assert_eq!(resp.status(), 201);
    let minutes_id = id_of(&body_to_json(resp).await);

    let resp = app
        .send(Method::POST, "/api/rituals/minutes/", &secretary, Some(minutes))
        .await;
    assert_eq!(resp.status(), 409, "A plan has at most one set of minutes");

    let approve = format!("/api/rituals/minutes/{minutes_id}/approve");
    assert_eq!(
        app.send(Method::POST, &approve, &master, None).await.status(),
        400,
        "Draft minutes cannot be approved"
    );

    let finalize = format!("/api/rituals/minutes/{minutes_id}/finalize");
    assert_eq!(app.send(Method::POST, &finalize, &secretary, None).await.status(), 200);
    assert_eq!(
        app.send(Method::POST, &approve, &secretary, None).await.status(),
        403,
        "Approval needs approve_ritualplan"
    );
    assert_eq!(app.send(Method::POST, &approve, &master, None).await.status(), 200);

    let resp = app
        .send(Method::GET, &format!("/api/rituals/plans/{plan_id}"), &master, None)
        .await;
    let plan = body_to_json(resp).await;
    assert_eq!(plan["status"], "completed");
    assert_eq!(plan["has_minutes"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_warden_cannot_edit_plan_above_degree() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (master_id, master) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, master_id, OfficerRoleCode::Vm).await;
    let (warden_id, warden) = member_with_token(&app, &mut guard, 2).await;
    make_officer(&app.pool, warden_id, OfficerRoleCode::Sv).await;

    let resp = app
        .send(Method::POST, "/api/rituals/plans/", &master, Some(plan_body("Exaltación", 3)))
        .await;
    let plan = body_to_json(resp).await;
    let plan_id = id_of(&plan);
    let event_id: Uuid = plan["event_id"].as_str().unwrap().parse().unwrap();
    guard.delete_row("ritual_plans", plan_id);
    guard.delete_row("events", event_id);

    let uri = format!("/api/rituals/plans/{plan_id}");
    let edit = json!({ "description": "Cambio de orden del día" });
    assert_eq!(
        app.send(Method::PATCH, &uri, &warden, Some(edit.clone())).await.status(),
        404
    );
    assert_eq!(app.send(Method::PATCH, &uri, &master, Some(edit)).await.status(), 200);
}
