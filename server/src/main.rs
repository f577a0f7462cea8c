//! Luz y Verdad Server - Main Entry Point
//!
//! Lodge membership, records and treasury backend.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::info;

use lodge_server::{api, auth::SecretVault, config, db, email::EmailService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lodge_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Luz y Verdad Server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db::run_migrations(&db_pool).await?;

    // Email is optional - password reset is disabled if SMTP is not configured
    let email = if config.has_smtp() {
        match EmailService::new(&config) {
            Ok(service) => match service.test_connection().await {
                Ok(()) => {
                    info!("SMTP connection verified");
                    Some(service)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SMTP connection test failed. Password reset disabled.");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Email service initialization failed. Password reset disabled.");
                None
            }
        }
    } else {
        info!("SMTP not configured, password reset emails disabled");
        None
    };

    let vault = SecretVault::from_hex_key(config.mfa_encryption_key.as_deref())
        .context("MFA_ENCRYPTION_KEY must be 32 bytes of hex")?;
    if config.mfa_encryption_key.is_none() {
        tracing::warn!("MFA_ENCRYPTION_KEY not set, TOTP secrets are stored unsealed");
    }

    // Build application state
    let state = api::AppState::new(db_pool, config.clone(), email, vault);

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    info!("Server shutdown complete");

    Ok(())
}
