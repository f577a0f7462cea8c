//! HTTP Integration Tests for the Document Library
//!
//! Degree gating, download accounting, ratings, comment authorship and the
//! category tree.
//!
//! Run with: `cargo test --test library_http_test -- --ignored`

mod helpers;

use axum::http::Method;
use helpers::{body_to_json, grant, id_of, make_officer, member_with_token, TestApp};
use lodge_server::permissions::{LodgePermissions, OfficerRoleCode};
use serde_json::json;
use serial_test::serial;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_master_document_hidden_from_apprentice() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (secretary_id, secretary) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, secretary_id, OfficerRoleCode::Sec).await;
    let (_, apprentice) = member_with_token(&app, &mut guard, 1).await;
    let (_, master) = member_with_token(&app, &mut guard, 3).await;

    let resp = app
        .send(
            Method::POST,
            "/api/library/documents/",
            &secretary,
            Some(json!({
                "title": "Catecismo del tercer grado",
                "file": "library/documents/catecismo-3.pdf",
                "required_degree": 3
            })),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let doc = body_to_json(resp).await;
    let doc_id = id_of(&doc);
    guard.delete_row("documents", doc_id);
    assert_eq!(doc["language"], "es");

    let uri = format!("/api/library/documents/{doc_id}");
    assert_eq!(app.send(Method::GET, &uri, &apprentice, None).await.status(), 404);
    let download = format!("{uri}/download");
    assert_eq!(app.send(Method::POST, &download, &apprentice, None).await.status(), 404);

    let resp = app.send(Method::POST, &download, &master, None).await;
    assert_eq!(resp.status(), 200);
    let body = body_to_json(resp).await;
    assert_eq!(body["download_url"], "library/documents/catecismo-3.pdf");

    let resp = app.send(Method::GET, &uri, &master, None).await;
    let doc = body_to_json(resp).await;
    assert_eq!(doc["download_count"], 1);
    assert_eq!(doc["view_count"], 1);

    // The apprentice's listing does not include it.
    let resp = app
        .send(Method::GET, "/api/library/documents/?search=tercer", &apprentice, None)
        .await;
    let page = body_to_json(resp).await;
    assert!(!page["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["id"] == doc_id.to_string()));

    // Access logs are for Masters only.
    let resp = app
        .send(Method::GET, "/api/library/access-logs/", &apprentice, None)
        .await;
    assert_eq!(resp.status(), 403);
    let resp = app
        .send(
            Method::GET,
            &format!("/api/library/access-logs/?document_id={doc_id}"),
            &master,
            None,
        )
        .await;
    assert_eq!(resp.status(), 200);
    let page = body_to_json(resp).await;
    assert_eq!(page["total"], 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_rating_and_comments() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (secretary_id, secretary) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, secretary_id, OfficerRoleCode::Sec).await;
    let (_, reader) = member_with_token(&app, &mut guard, 1).await;
    let (_, other) = member_with_token(&app, &mut guard, 1).await;

    let resp = app
        .send(
            Method::POST,
            "/api/library/documents/",
            &secretary,
            Some(json!({ "title": "Reglamento interno", "file": "library/documents/reglamento.pdf" })),
        )
        .await;
    let doc_id = id_of(&body_to_json(resp).await);
    guard.delete_row("documents", doc_id);

    let rate = format!("/api/library/documents/{doc_id}/rate");
    for bad in [json!(6), json!(0), json!("cinco")] {
        let resp = app.send(Method::POST, &rate, &reader, Some(json!({ "rating": bad }))).await;
        assert_eq!(resp.status(), 400);
    }

    // Rating again replaces the previous value.
    assert_eq!(
        app.send(Method::POST, &rate, &reader, Some(json!({ "rating": 2 }))).await.status(),
        200
    );
    assert_eq!(
        app.send(Method::POST, &rate, &reader, Some(json!({ "rating": 5 }))).await.status(),
        200
    );
    let resp = app
        .send(Method::GET, &format!("/api/library/documents/{doc_id}"), &reader, None)
        .await;
    let doc = body_to_json(resp).await;
    assert_eq!(doc["ratings_count"], 1);
    assert_eq!(doc["average_rating"], 5.0);

    // The plain collection endpoint refuses a second rating.
    let resp = app
        .send(
            Method::POST,
            "/api/library/ratings/",
            &reader,
            Some(json!({ "document_id": doc_id, "rating": 3 })),
        )
        .await;
    assert_eq!(resp.status(), 409);

    let resp = app
        .send(
            Method::POST,
            &format!("/api/library/documents/{doc_id}/add_comment"),
            &reader,
            Some(json!({ "content": "Muy útil para los aprendices." })),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let comment_id = id_of(&body_to_json(resp).await);

    let uri = format!("/api/library/comments/{comment_id}");
    let edit = json!({ "content": "Editado" });
    assert_eq!(
        app.send(Method::PATCH, &uri, &other, Some(edit.clone())).await.status(),
        403
    );
    assert_eq!(app.send(Method::PATCH, &uri, &reader, Some(edit)).await.status(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_editor_below_degree_cannot_edit_document() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (secretary_id, secretary) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, secretary_id, OfficerRoleCode::Sec).await;
    let (editor_id, editor) = member_with_token(&app, &mut guard, 2).await;
    grant(&app.pool, editor_id, LodgePermissions::CHANGE_DOCUMENT).await;

    let resp = app
        .send(
            Method::POST,
            "/api/library/documents/",
            &secretary,
            Some(json!({
                "title": "Leyenda del tercer grado",
                "file": "library/documents/leyenda-3.pdf",
                "required_degree": 3
            })),
        )
        .await;
    let doc_id = id_of(&body_to_json(resp).await);
    guard.delete_row("documents", doc_id);

    let uri = format!("/api/library/documents/{doc_id}");
    let edit = json!({ "title": "Editado" });
    assert_eq!(
        app.send(Method::PATCH, &uri, &editor, Some(edit.clone())).await.status(),
        404
    );
    assert_eq!(
        app.send(Method::POST, &format!("{uri}/toggle_featured"), &editor, None)
            .await
            .status(),
        404
    );
    assert_eq!(app.send(Method::DELETE, &uri, &editor, None).await.status(), 404);

    let resp = app.send(Method::PATCH, &uri, &secretary, Some(edit)).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_to_json(resp).await["title"], "Editado");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore]
async fn test_category_tree_degree_and_cycles() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (secretary_id, secretary) = member_with_token(&app, &mut guard, 3).await;
    make_officer(&app.pool, secretary_id, OfficerRoleCode::Sec).await;
    let (_, apprentice) = member_with_token(&app, &mut guard, 1).await;

    let suffix = &uuid::Uuid::new_v4().to_string()[..6];
    let create = |name: String, parent: Option<uuid::Uuid>| {
        json!({ "name": name, "parent_id": parent, "required_degree": 1 })
    };

    let resp = app
        .send(
            Method::POST,
            "/api/library/categories/",
            &secretary,
            Some(create(format!("Simbolismo {suffix}"), None)),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let root_id = id_of(&body_to_json(resp).await);
    guard.delete_row("document_categories", root_id);

    let resp = app
        .send(
            Method::POST,
            "/api/library/categories/",
            &secretary,
            Some(create("Herramientas".to_string(), Some(root_id))),
        )
        .await;
    let child_id = id_of(&body_to_json(resp).await);

    let resp = app
        .send(
            Method::POST,
            "/api/library/categories/",
            &secretary,
            Some(create("Escuadra".to_string(), Some(child_id))),
        )
        .await;
    let leaf = body_to_json(resp).await;
    let leaf_id = id_of(&leaf);
    assert_eq!(
        leaf["full_path"],
        format!("Simbolismo {suffix} > Herramientas > Escuadra")
    );

    // A category cannot move under itself or a descendant.
    let root_uri = format!("/api/library/categories/{root_id}");
    for parent in [root_id, leaf_id] {
        let resp = app
            .send(Method::PATCH, &root_uri, &secretary, Some(json!({ "parent_id": parent })))
            .await;
        assert_eq!(resp.status(), 400);
    }

    // Raising the root raises every descendant.
    let resp = app
        .send(Method::PATCH, &root_uri, &secretary, Some(json!({ "required_degree": 3 })))
        .await;
    assert_eq!(resp.status(), 200);
    let leaf_uri = format!("/api/library/categories/{leaf_id}");
    let resp = app.send(Method::GET, &leaf_uri, &secretary, None).await;
    assert_eq!(body_to_json(resp).await["required_degree"], 3);
    assert_eq!(app.send(Method::GET, &leaf_uri, &apprentice, None).await.status(), 404);

    // A new subcategory inherits at least its parent's degree.
    let resp = app
        .send(
            Method::POST,
            "/api/library/categories/",
            &secretary,
            Some(create("Compás".to_string(), Some(child_id))),
        )
        .await;
    assert_eq!(resp.status(), 201);
    assert_eq!(body_to_json(resp).await["required_degree"], 3);
}
