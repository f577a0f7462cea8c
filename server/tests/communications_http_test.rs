//! HTTP Integration Tests for Communications
//!
//! Messages and mailbox flags, notification delivery and read receipts,
//! event status transitions and degree gating.
//!
//! Run with: `cargo test --test communications_http_test -- --ignored`

mod helpers;

use axum::http::Method;
use helpers::{body_to_json, id_of, make_officer, member_with_token, TestApp};
use lodge_server::permissions::OfficerRoleCode;
use serde_json::json;
use serial_test::serial;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_message_flow_between_members() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (_, sender) = member_with_token(&app, &mut guard, 2).await;
    let (recipient_id, recipient) = member_with_token(&app, &mut guard, 1).await;
    let (_, outsider) = member_with_token(&app, &mut guard, 3).await;

    // Sending needs at least one recipient.
    let resp = app
        .send(
            Method::POST,
            "/api/communications/messages/",
            &sender,
            Some(json!({ "subject": "Convocatoria", "content": "Nos vemos el lunes." })),
        )
        .await;
    assert_eq!(resp.status(), 400);

    let resp = app
        .send(
            Method::POST,
            "/api/communications/messages/",
            &sender,
            Some(json!({
                "subject": "Convocatoria",
                "content": "Nos vemos el lunes.",
                "recipients": [recipient_id]
            })),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let message = body_to_json(resp).await;
    let message_id = id_of(&message);
    assert_eq!(message["recipients_count"], 1);

    let uri = format!("/api/communications/messages/{message_id}");
    assert_eq!(app.send(Method::GET, &uri, &outsider, None).await.status(), 404);

    let resp = app
        .send(Method::GET, "/api/communications/messages/?unread=true", &recipient, None)
        .await;
    let page = body_to_json(resp).await;
    assert_eq!(page["total"], 1);

    // Opening the message marks it read.
    assert_eq!(app.send(Method::GET, &uri, &recipient, None).await.status(), 200);
    let resp = app
        .send(Method::GET, "/api/communications/messages/?unread=true", &recipient, None)
        .await;
    let page = body_to_json(resp).await;
    assert_eq!(page["total"], 0);

    // Only recipients can star, only the sender can edit.
    assert_eq!(
        app.send(Method::POST, &format!("{uri}/star"), &outsider, None).await.status(),
        400
    );
    assert_eq!(
        app.send(Method::POST, &format!("{uri}/star"), &recipient, None).await.status(),
        200
    );
    let resp = app
        .send(Method::GET, "/api/communications/messages/?inbox_type=starred", &recipient, None)
        .await;
    let page = body_to_json(resp).await;
    assert_eq!(page["items"][0]["id"], message_id.to_string());

    let edit = json!({ "subject": "Convocatoria (corregida)" });
    assert_eq!(
        app.send(Method::PATCH, &uri, &recipient, Some(edit)).await.status(),
        403
    );
    assert_eq!(app.send(Method::DELETE, &uri, &sender, None).await.status(), 204);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_notification_read_receipts() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (secretary_id, secretary) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, secretary_id, OfficerRoleCode::Sec).await;
    let (member_id, member) = member_with_token(&app, &mut guard, 1).await;
    let (_, other) = member_with_token(&app, &mut guard, 1).await;

    let resp = app
        .send(
            Method::POST,
            "/api/communications/notifications/",
            &member,
            Some(json!({ "title": "Aviso", "content": "x", "recipients": [member_id] })),
        )
        .await;
    assert_eq!(resp.status(), 403);

    let resp = app
        .send(
            Method::POST,
            "/api/communications/notifications/",
            &secretary,
            Some(json!({
                "title": "Cambio de horario",
                "content": "La tenida comienza a las 20:00.",
                "notification_type": "important",
                "recipients": [member_id]
            })),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let notification = body_to_json(resp).await;
    let notification_id = id_of(&notification);
    guard.delete_row("notifications", notification_id);
    assert_eq!(notification["recipients_count"], 1);
    assert_eq!(notification["read_count"], 0);

    let read = format!("/api/communications/notifications/{notification_id}/mark_as_read");
    assert_eq!(app.send(Method::POST, &read, &other, None).await.status(), 400);
    assert_eq!(app.send(Method::POST, &read, &member, None).await.status(), 200);

    let resp = app
        .send(
            Method::GET,
            &format!("/api/communications/notifications/{notification_id}"),
            &secretary,
            None,
        )
        .await;
    let notification = body_to_json(resp).await;
    assert_eq!(notification["read_count"], 1);

    // Non-staff members only see what was delivered to them.
    let resp = app
        .send(Method::GET, "/api/communications/notifications/", &other, None)
        .await;
    let page = body_to_json(resp).await;
    assert!(!page["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["id"] == notification_id.to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_event_transitions_and_degree() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (secretary_id, secretary) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, secretary_id, OfficerRoleCode::Sec).await;
    let (_, apprentice) = member_with_token(&app, &mut guard, 1).await;

    let event = |end: &str| {
        json!({
            "title": "Tenida de Maestros",
            "date": "2030-09-10",
            "start_time": "20:00:00",
            "end_time": end,
            "required_degree": 3
        })
    };

    let resp = app
        .send(Method::POST, "/api/communications/events/", &secretary, Some(event("19:00:00")))
        .await;
    assert_eq!(resp.status(), 400, "End time before start time");

    let resp = app
        .send(Method::POST, "/api/communications/events/", &secretary, Some(event("22:00:00")))
        .await;
    assert_eq!(resp.status(), 201);
    let event_id = id_of(&body_to_json(resp).await);
    guard.delete_row("events", event_id);

    let uri = format!("/api/communications/events/{event_id}");
    assert_eq!(app.send(Method::GET, &uri, &apprentice, None).await.status(), 404);
    assert_eq!(
        app.send(Method::POST, &format!("{uri}/cancel"), &apprentice, None).await.status(),
        403
    );

    let cancel = format!("{uri}/cancel");
    assert_eq!(app.send(Method::POST, &cancel, &secretary, None).await.status(), 200);
    assert_eq!(app.send(Method::POST, &cancel, &secretary, None).await.status(), 400);

    let resp = app.send(Method::GET, &uri, &secretary, None).await;
    assert_eq!(body_to_json(resp).await["status"], "cancelled");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_calendar_rejects_duplicate_event() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (secretary_id, secretary) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, secretary_id, OfficerRoleCode::Sec).await;
    let (_, apprentice) = member_with_token(&app, &mut guard, 1).await;

    let resp = app
        .send(
            Method::POST,
            "/api/communications/events/",
            &secretary,
            Some(json!({
                "title": "Tenida de San Juan",
                "date": "2030-06-24",
                "start_time": "19:00:00",
                "required_degree": 1
            })),
        )
        .await;
    let event_id = id_of(&body_to_json(resp).await);
    guard.delete_row("events", event_id);

    let resp = app
        .send(
            Method::POST,
            "/api/communications/calendars/",
            &secretary,
            Some(json!({
                "title": "Calendario masónico 2030",
                "year": 2030,
                "start_date": "2030-01-01",
                "end_date": "2030-12-31"
            })),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let calendar_id = id_of(&body_to_json(resp).await);
    guard.delete_row("calendars", calendar_id);

    let add = format!("/api/communications/calendars/{calendar_id}/add_event");
    let entry = json!({ "event_id": event_id, "notes": "Solsticio", "is_highlighted": true });
    assert_eq!(
        app.send(Method::POST, &add, &apprentice, Some(entry.clone())).await.status(),
        403
    );
    assert_eq!(
        app.send(Method::POST, &add, &secretary, Some(entry.clone())).await.status(),
        201
    );
    assert_eq!(app.send(Method::POST, &add, &secretary, Some(entry)).await.status(), 409);

    let resp = app
        .send(
            Method::GET,
            &format!("/api/communications/calendars/{calendar_id}"),
            &apprentice,
            None,
        )
        .await;
    assert_eq!(body_to_json(resp).await["events_count"], 1);

    let resp = app
        .send(
            Method::GET,
            &format!("/api/communications/calendars/{calendar_id}/events"),
            &apprentice,
            None,
        )
        .await;
    let entries = body_to_json(resp).await;
    assert_eq!(entries[0]["id"], event_id.to_string());
    assert_eq!(entries[0]["is_highlighted"], true);
}
