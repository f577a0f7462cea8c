//! Authentication integration tests.
//!
//! Tests for critical authentication flows including:
//! - Password hashing and token hashing
//! - Login with valid/invalid credentials
//! - Refresh token rotation
//! - Two-factor enrollment, login and disable
//! - Password reset confirmation
//! - Session revocation and expiry
//!
//! Run with: `cargo test --test auth_test`
//! Run ignored (integration) tests: `cargo test --test auth_test -- --ignored`

mod helpers;

use axum::body::Body;
use axum::http::Method;
use helpers::{body_to_json, create_test_user, TestApp, TEST_PASSWORD};
use lodge_server::auth::password::{hash_password, hash_token, verify_password};
use lodge_server::auth::two_factor::build_totp;
use lodge_server::db;
use serde_json::json;
use serial_test::serial;

// ============================================================================
// Password Hashing Tests (Unit tests - no database required)
// ============================================================================

#[test]
fn test_password_hash_and_verify_success() {
    let password = "secure_password_123!";
    let hash = hash_password(password).expect("Hashing should succeed");

    assert_ne!(hash, password);

    let verified = verify_password(password, &hash).expect("Verification should succeed");
    assert!(verified, "Correct password should verify");
}

#[test]
fn test_password_verify_wrong_password() {
    let hash = hash_password("correct_password").expect("Hashing should succeed");

    let verified = verify_password("wrong_password", &hash).expect("Verification should succeed");
    assert!(!verified, "Wrong password should not verify");
}

#[test]
fn test_password_hash_produces_unique_hashes() {
    let password = "same_password";

    let hash1 = hash_password(password).expect("Hashing should succeed");
    let hash2 = hash_password(password).expect("Hashing should succeed");

    // Same password should produce different hashes (due to salt)
    assert_ne!(hash1, hash2, "Argon2 should produce unique hashes with different salts");
    assert!(verify_password(password, &hash1).unwrap());
    assert!(verify_password(password, &hash2).unwrap());
}

#[test]
fn test_password_hash_handles_unicode() {
    let password = "acacia-ñandú-€";

    let hash = hash_password(password).expect("Hashing unicode should succeed");
    let verified = verify_password(password, &hash).expect("Verification should succeed");
    assert!(verified, "Unicode password should verify");
}

#[test]
fn test_token_hash_produces_hex_output() {
    let hash = hash_token("any_token_value");

    // SHA256 produces 64 hex characters
    assert_eq!(hash.len(), 64, "SHA256 hash should be 64 hex chars");
    assert!(hash.chars().all(|c: char| c.is_ascii_hexdigit()));
    assert_eq!(hash, hash_token("any_token_value"), "Token hash should be deterministic");
}

// ============================================================================
// Integration Tests (require database - marked as #[ignore])
// ============================================================================

async fn post_public(app: &TestApp, uri: &str, body: serde_json::Value) -> axum::http::Response<Body> {
    let req = TestApp::request(Method::POST, uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request");
    app.oneshot(req).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_login_and_refresh_rotation() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (user_id, username) = create_test_user(&app.pool, 2).await;
    guard.delete_user(user_id);

    let resp = post_public(&app, "/api/auth/token/", json!({ "username": username })).await;
    assert_eq!(resp.status(), 400, "Password is required");

    let resp = post_public(
        &app,
        "/api/auth/token/",
        json!({ "username": username, "password": "not-the-password" }),
    )
    .await;
    assert_eq!(resp.status(), 401);

    let resp = post_public(
        &app,
        "/api/auth/token/",
        json!({ "username": username, "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let tokens = body_to_json(resp).await;
    assert_eq!(tokens["user"]["id"], user_id.to_string());
    assert_eq!(tokens["user"]["degree"], 2);
    let access = tokens["access"].as_str().unwrap().to_string();
    let refresh = tokens["refresh"].as_str().unwrap().to_string();

    let resp = app.send(Method::GET, "/api/auth/users/me/", &access, None).await;
    assert_eq!(resp.status(), 200);

    // An access token is not a refresh token.
    let resp = post_public(&app, "/api/auth/token/refresh/", json!({ "refresh": access })).await;
    assert_eq!(resp.status(), 401);

    let resp = post_public(&app, "/api/auth/token/refresh/", json!({ "refresh": refresh })).await;
    assert_eq!(resp.status(), 200);
    let rotated = body_to_json(resp).await;
    assert_ne!(rotated["refresh"], refresh.as_str());

    // The old refresh token is single-use.
    let resp = post_public(&app, "/api/auth/token/refresh/", json!({ "refresh": refresh })).await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    let req = TestApp::request(Method::GET, "/api/members/members/")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.oneshot(req).await.status(), 401);

    let resp = app
        .send(Method::GET, "/api/members/members/", "not.a.jwt", None)
        .await;
    assert_eq!(resp.status(), 401);
}

fn current_code(secret: &str) -> String {
    build_totp(secret, "test", "test@example.org")
        .expect("Valid secret")
        .generate_current()
        .expect("Clock after epoch")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_two_factor_enrollment_and_login() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (user_id, username) = create_test_user(&app.pool, 3).await;
    guard.delete_user(user_id);
    let token = helpers::generate_access_token(&app.config, user_id);

    // Nothing pending yet.
    let resp = app
        .send(Method::POST, "/api/auth/two-factor/setup/", &token, Some(json!({ "code": "123456" })))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = app.send(Method::GET, "/api/auth/two-factor/setup/", &token, None).await;
    assert_eq!(resp.status(), 200);
    let setup = body_to_json(resp).await;
    let secret = setup["secret_key"].as_str().unwrap().to_string();
    assert!(setup["qr_code"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));

    let resp = app
        .send(Method::POST, "/api/auth/two-factor/setup/", &token, Some(json!({ "code": "abcdef" })))
        .await;
    assert_eq!(resp.status(), 400);
    let resp = app
        .send(
            Method::POST,
            "/api/auth/two-factor/setup/",
            &token,
            Some(json!({ "code": current_code(&secret) })),
        )
        .await;
    assert_eq!(resp.status(), 200);

    // Password login now stops at the challenge.
    let resp = post_public(
        &app,
        "/api/auth/token/",
        json!({ "username": username, "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let challenge = body_to_json(resp).await;
    assert_eq!(challenge["requires_2fa"], true);
    assert_eq!(challenge["user_id"], user_id.to_string());
    assert!(challenge.get("access").is_none());

    let verify = "/api/auth/two-factor/verify/";
    let resp = post_public(&app, verify, json!({ "user_id": user_id })).await;
    assert_eq!(resp.status(), 400);
    let resp = post_public(&app, verify, json!({ "user_id": uuid::Uuid::new_v4(), "code": "123456" })).await;
    assert_eq!(resp.status(), 404);
    let resp = post_public(&app, verify, json!({ "user_id": user_id, "code": "abcdef" })).await;
    assert_eq!(resp.status(), 401);
    let resp = post_public(
        &app,
        verify,
        json!({ "user_id": user_id, "code": current_code(&secret) }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    assert!(body_to_json(resp).await["access"].is_string());

    // Disabling needs a valid code.
    let disable = "/api/auth/two-factor/disable/";
    let resp = app
        .send(Method::POST, disable, &token, Some(json!({ "code": "abcdef" })))
        .await;
    assert_eq!(resp.status(), 400);
    let resp = app
        .send(Method::POST, disable, &token, Some(json!({ "code": current_code(&secret) })))
        .await;
    assert_eq!(resp.status(), 200);

    let resp = post_public(
        &app,
        "/api/auth/token/",
        json!({ "username": username, "password": TEST_PASSWORD }),
    )
    .await;
    assert!(body_to_json(resp).await["access"].is_string());
    let resp = post_public(
        &app,
        verify,
        json!({ "user_id": user_id, "code": current_code(&secret) }),
    )
    .await;
    assert_eq!(resp.status(), 401, "Two-factor is no longer confirmed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_password_reset_confirm() {
    let app = TestApp::new().await;
    let mut guard = app.cleanup_guard();
    let (user_id, username) = create_test_user(&app.pool, 1).await;
    guard.delete_user(user_id);

    // Unknown and known addresses get the same answer.
    let unknown = post_public(&app, "/api/auth/password-reset/", json!({ "email": "nadie@example.org" })).await;
    let known = post_public(
        &app,
        "/api/auth/password-reset/",
        json!({ "email": format!("{username}@example.org") }),
    )
    .await;
    assert_eq!(unknown.status(), 200);
    assert_eq!(known.status(), 200);
    assert_eq!(body_to_json(unknown).await, body_to_json(known).await);

    let resp = post_public(
        &app,
        "/api/auth/token/",
        json!({ "username": username, "password": TEST_PASSWORD }),
    )
    .await;
    let refresh = body_to_json(resp).await["refresh"].as_str().unwrap().to_string();

    let raw_token = "token-de-restablecimiento";
    db::create_password_reset_token(
        &app.pool,
        user_id,
        &hash_token(raw_token),
        chrono::Utc::now() + chrono::Duration::hours(1),
    )
    .await
    .expect("Reset token should be created");

    let confirm = "/api/auth/password-reset/confirm/";
    let new_password = "nueva-piedra-cubica";
    let resp = post_public(&app, confirm, json!({ "token": raw_token, "password": "corta" })).await;
    assert_eq!(resp.status(), 400);
    let resp = post_public(&app, confirm, json!({ "token": "otro", "password": new_password })).await;
    assert_eq!(resp.status(), 400);
    let resp = post_public(&app, confirm, json!({ "token": raw_token, "password": new_password })).await;
    assert_eq!(resp.status(), 200);

    // Single use.
    let resp = post_public(&app, confirm, json!({ "token": raw_token, "password": new_password })).await;
    assert_eq!(resp.status(), 400);

    // Every session was revoked.
    let resp = post_public(&app, "/api/auth/token/refresh/", json!({ "refresh": refresh })).await;
    assert_eq!(resp.status(), 401);

    let resp = post_public(
        &app,
        "/api/auth/token/",
        json!({ "username": username, "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(resp.status(), 401);
    let resp = post_public(
        &app,
        "/api/auth/token/",
        json!({ "username": username, "password": new_password }),
    )
    .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_session_revocation() {
    let pool = helpers::shared_pool().await;
    let (user_id, _) = create_test_user(pool, 1).await;

    let token1_hash = hash_token("token1");
    let token2_hash = hash_token("token2");
    let expires_at = chrono::Utc::now() + chrono::Duration::hours(24);

    db::create_session(pool, user_id, &token1_hash, expires_at, None, None)
        .await
        .expect("Session 1 should be created");
    db::create_session(pool, user_id, &token2_hash, expires_at, Some("127.0.0.1"), None)
        .await
        .expect("Session 2 should be created");

    let mut conn = pool.acquire().await.expect("Failed to acquire");
    let revoked = db::delete_all_user_sessions(&mut conn, user_id)
        .await
        .expect("Revocation should succeed");
    assert_eq!(revoked, 2, "Should revoke 2 sessions");

    let session1 = db::find_session_by_token_hash(pool, &token1_hash)
        .await
        .expect("Lookup should succeed");
    assert!(session1.is_none(), "Session 1 should be deleted");

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .ok();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_expired_session_not_found() {
    let pool = helpers::shared_pool().await;
    let (user_id, _) = create_test_user(pool, 1).await;

    let token_hash = hash_token("expired_token");
    let expires_at = chrono::Utc::now() - chrono::Duration::hours(1);
    db::create_session(pool, user_id, &token_hash, expires_at, None, None)
        .await
        .expect("Session insert should succeed");

    let found = db::find_session_by_token_hash(pool, &token_hash)
        .await
        .expect("Lookup should succeed");
    assert!(found.is_none(), "Expired session should not be found");

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .ok();
}
