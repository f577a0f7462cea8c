//! API Router and Application State
//!
//! Central routing configuration and shared state.

use axum::{extract::DefaultBodyLimit, middleware::from_fn_with_state, routing::get, Router};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{self, SecretVault},
    communications,
    config::Config,
    email::EmailService,
    library, members, rituals, system, treasury,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Server configuration
    pub config: Arc<Config>,
    /// Outgoing mail (optional, password reset is disabled without it)
    pub email: Option<EmailService>,
    /// Seals TOTP secrets at rest
    pub vault: SecretVault,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        db: PgPool,
        config: Config,
        email: Option<EmailService>,
        vault: SecretVault,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            email,
            vault,
        }
    }

    /// Check if outgoing mail is configured.
    #[must_use]
    pub const fn has_email(&self) -> bool {
        self.email.is_some()
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body_size = state.config.max_body_size;

    // Protected routes that require authentication
    let protected_routes = Router::new()
        .nest("/api/members", members::router())
        .nest("/api/communications", communications::router())
        .nest("/api/library", library::router())
        .nest("/api/rituals", rituals::router())
        .nest("/api/treasury", treasury::router())
        .nest("/api/core", system::router())
        .layer(from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        // Liveness, no auth
        .route("/health", get(system::handlers::liveness))
        // Auth routes (pass state for middleware)
        .nest("/api/auth", auth::router(state.clone()))
        .merge(protected_routes)
        // API documentation
        .merge(api_docs())
        // Middleware
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_size))
        // State
        .with_state(state)
}

/// Registers the bearer JWT scheme referenced by `security(("bearer_auth" = []))`.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Luz y Verdad API", description = "Lodge membership, records and treasury"),
    paths(
        auth::handlers::login,
        auth::handlers::refresh_token,
        auth::handlers::two_factor_verify,
        auth::handlers::two_factor_setup_start,
        auth::handlers::two_factor_setup_confirm,
        auth::handlers::two_factor_disable,
        auth::handlers::password_reset,
        auth::handlers::password_reset_confirm,
        auth::users::list_users,
        auth::users::create_user,
        auth::users::get_user,
        auth::users::update_user,
        auth::users::me,
        auth::users::change_password,
        auth::users::put_officer_role,
        members::handlers::list_members,
        members::handlers::get_member,
        members::handlers::update_profile,
        members::handlers::create_document,
        members::handlers::create_progress,
        members::handlers::create_attendance,
        communications::calendars::create_calendar,
        communications::calendars::add_event,
        communications::events::list_events,
        communications::events::create_event,
        communications::events::get_event,
        communications::events::mark_as_completed,
        communications::events::cancel,
        communications::events::attendees,
        communications::messages::list_messages,
        communications::messages::get_message,
        communications::messages::create_message,
        communications::notifications::list_notifications,
        communications::notifications::create_notification,
        communications::notifications::mark_as_read,
        library::access::list_access_logs,
        library::categories::list_categories,
        library::categories::create_category,
        library::documents::list_documents,
        library::documents::create_document,
        library::documents::download,
        rituals::plans::list_plans,
        rituals::plans::create_plan,
        rituals::plans::approve,
        rituals::roles::assign,
        rituals::works::update_status,
        rituals::minutes::create_minutes,
        rituals::minutes::approve,
        treasury::fees::create_fee,
        treasury::payments::list_payments,
        treasury::payments::mark_as_completed,
        treasury::invoices::create_invoice,
        treasury::invoices::issue,
        treasury::reports::create_report,
        treasury::summary::summary,
        system::handlers::get_configuration,
        system::handlers::update_configuration,
        system::handlers::list_logs,
        system::handlers::add_log,
        system::handlers::list_backups,
        system::handlers::create_backup,
        system::handlers::restore_backup,
        system::handlers::list_health,
        system::handlers::current_health,
        system::handlers::health_summary,
        system::handlers::liveness,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login, tokens, two-factor and password reset"),
        (name = "users", description = "Accounts and officer roles"),
        (name = "members", description = "Member profiles, documents, progress and attendance"),
        (name = "communications", description = "Events, calendars, notifications and messages"),
        (name = "library", description = "Document library"),
        (name = "rituals", description = "Ritual plans and minutes"),
        (name = "treasury", description = "Fees, payments, invoices, reports and expenses"),
        (name = "core", description = "Configuration, logs, backups and health"),
    )
)]
pub struct ApiDoc;

/// Swagger UI at `/api/docs`, OpenAPI document at `/api/docs/openapi.json`.
fn api_docs() -> Router<AppState> {
    SwaggerUi::new("/api/docs")
        .url("/api/docs/openapi.json", ApiDoc::openapi())
        .into()
}
