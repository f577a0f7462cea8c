//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum router,
//! plus utilities for member creation, officer roles, grants and JWT generation.
//!
//! ## Shared Resources
//!
//! Use [`shared_pool()`] to avoid creating a new pool per test. Migrations run
//! once, on first connect.
//!
//! ## Cleanup Guards
//!
//! Use [`CleanupGuard`] for RAII-based cleanup that runs even if a test panics.
#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use lodge_server::api::{create_router, AppState};
use lodge_server::auth::{jwt, SecretVault};
use lodge_server::config::Config;
use lodge_server::db::{self, NewUser};
use lodge_server::permissions::{cascade, LodgePermissions, OfficerRoleCode};
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

// ============================================================================
// Shared resources
// ============================================================================

/// Shared database pool across all tests in the same binary.
static SHARED_POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Shared config across all tests in the same binary.
static SHARED_CONFIG: OnceCell<Config> = OnceCell::const_new();

/// Get or create a shared database pool with migrations applied.
pub async fn shared_pool() -> &'static PgPool {
    SHARED_POOL
        .get_or_init(|| async {
            let config = shared_config().await;
            let pool = db::create_pool(&config.database_url)
                .await
                .expect("Failed to connect to test DB");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");
            pool
        })
        .await
}

/// Get or create a shared config.
pub async fn shared_config() -> &'static Config {
    SHARED_CONFIG
        .get_or_init(|| async { Config::default_for_test() })
        .await
}

// ============================================================================
// Cleanup Guard
// ============================================================================

/// Async cleanup action type.
type CleanupAction = Box<dyn FnOnce(PgPool) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// RAII guard that runs cleanup actions on drop, even if the test panics.
///
/// # Example
///
/// ```ignore
/// let mut guard = app.cleanup_guard();
/// guard.delete_user(user_id);
///
/// // Test assertions here, cleanup runs even if these panic
/// assert_eq!(resp.status(), 200);
/// ```
pub struct CleanupGuard {
    pool: PgPool,
    actions: Vec<CleanupAction>,
}

impl CleanupGuard {
    /// Create a new cleanup guard for the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            actions: Vec::new(),
        }
    }

    /// Register a generic async cleanup action.
    pub fn add<F, Fut>(&mut self, action: F)
    where
        F: FnOnce(PgPool) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.actions.push(Box::new(move |pool| Box::pin(action(pool))));
    }

    /// Register cleanup to delete a user by ID (cascades to their records).
    pub fn delete_user(&mut self, user_id: Uuid) {
        self.add(move |pool| async move {
            let _ = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(user_id)
                .execute(&pool)
                .await;
        });
    }

    /// Register cleanup to run one `DELETE FROM <table> WHERE id = $1`.
    pub fn delete_row(&mut self, table: &'static str, id: Uuid) {
        self.add(move |pool| async move {
            let _ = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
                .bind(id)
                .execute(&pool)
                .await;
        });
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let actions = std::mem::take(&mut self.actions);
        if actions.is_empty() {
            return;
        }

        let pool = self.pool.clone();
        let handle = tokio::runtime::Handle::current();

        // Spawn a blocking thread to run async cleanup.
        // This works regardless of tokio runtime flavor.
        std::thread::spawn(move || {
            handle.block_on(async move {
                for action in actions {
                    action(pool.clone()).await;
                }
            });
        })
        .join()
        .expect("Cleanup thread panicked");
    }
}

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a new test app using the shared DB pool.
    pub async fn new() -> Self {
        let pool = shared_pool().await.clone();
        let config = shared_config().await.clone();
        let vault = SecretVault::from_hex_key(config.mfa_encryption_key.as_deref())
            .expect("Failed to build secret vault");

        let state = AppState::new(pool.clone(), config.clone(), None, vault);
        let router = create_router(state);

        Self {
            router,
            pool,
            config: Arc::new(config),
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send an authenticated request with an optional JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let builder = Self::request(method, uri).header("Authorization", format!("Bearer {token}"));
        let req = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");
        self.oneshot(req).await
    }

    /// Create a [`CleanupGuard`] for this app's pool.
    pub fn cleanup_guard(&self) -> CleanupGuard {
        CleanupGuard::new(self.pool.clone())
    }
}

// ============================================================================
// Member & Auth helpers
// ============================================================================

/// Password every test member is created with.
pub const TEST_PASSWORD: &str = "escuadra-y-compas-2025";

/// Create an active member of `degree` (with the new-user cascade applied)
/// and return `(user_id, username)`.
pub async fn create_test_user(pool: &PgPool, degree: i16) -> (Uuid, String) {
    let test_id = Uuid::new_v4().to_string()[..8].to_string();
    let username = format!("httptest_{test_id}");
    let email = format!("{username}@example.org");
    let password_hash =
        lodge_server::auth::password::hash_password(TEST_PASSWORD).expect("Failed to hash");

    let mut tx = pool.begin().await.expect("Failed to begin");
    let user = db::insert_user(
        &mut tx,
        &NewUser {
            username: &username,
            email: &email,
            password_hash: &password_hash,
            first_name: "Hiram",
            last_name: "Abif",
            degree,
            ..NewUser::default()
        },
    )
    .await
    .expect("Failed to create test user");
    cascade::on_user_created(&mut tx, user.id)
        .await
        .expect("Failed to apply new-user cascade");
    tx.commit().await.expect("Failed to commit");

    (user.id, username)
}

/// Give a user an active officer role, running the role cascade.
pub async fn make_officer(pool: &PgPool, user_id: Uuid, role: OfficerRoleCode) {
    let mut tx = pool.begin().await.expect("Failed to begin");
    db::upsert_officer_role(&mut tx, user_id, role, Utc::now().date_naive(), None, true)
        .await
        .expect("Failed to save officer role");
    cascade::on_officer_role_saved(&mut tx, user_id, role, true)
        .await
        .expect("Failed to apply officer cascade");
    tx.commit().await.expect("Failed to commit");
}

/// Flag a user as staff.
pub async fn make_staff(pool: &PgPool, user_id: Uuid) {
    sqlx::query("UPDATE users SET is_staff = TRUE WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to flag staff");
}

/// Add codenames to a user's direct grants.
pub async fn grant(pool: &PgPool, user_id: Uuid, permissions: LodgePermissions) {
    let mut conn = pool.acquire().await.expect("Failed to acquire");
    cascade::grant_permissions(&mut conn, user_id, permissions)
        .await
        .expect("Failed to grant permissions");
}

/// Generate an access token for the given user.
pub fn generate_access_token(config: &Config, user_id: Uuid) -> String {
    let pair = jwt::generate_token_pair(
        user_id,
        &config.jwt_secret,
        config.jwt_access_expiry,
        config.jwt_refresh_expiry,
    )
    .expect("Failed to generate token pair");
    pair.access_token
}

/// Create a member and return `(user_id, token)`, registering cleanup.
pub async fn member_with_token(app: &TestApp, guard: &mut CleanupGuard, degree: i16) -> (Uuid, String) {
    let (user_id, _) = create_test_user(&app.pool, degree).await;
    guard.delete_user(user_id);
    (user_id, generate_access_token(&app.config, user_id))
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

/// Parse the `id` field of a JSON response.
pub fn id_of(json: &serde_json::Value) -> Uuid {
    json["id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("Response has no id: {json}"))
}
