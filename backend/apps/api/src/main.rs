//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use auth::application::ModerationUseCase;
use auth::{AuthConfig, PgAuthRepository};
use axum::{
    Router, http,
    http::{Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

/// How often the background sweep clears lapsed temporary bans
const BAN_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // Auth configuration
    let auth_config = if cfg!(debug_assertions) {
        AuthConfig::development()
    } else {
        // In production, load signing secrets from environment
        AuthConfig {
            access_secret: secret_from_env("AUTH_ACCESS_SECRET")?,
            refresh_secret: secret_from_env("AUTH_REFRESH_SECRET")?,
            ..AuthConfig::default()
        }
    };

    let auth_repo = Arc::new(PgAuthRepository::new(pool.clone()));

    // Startup cleanup: clear bans that lapsed while the server was down.
    // Errors here should not prevent server startup; the ban gate clears
    // lapsed bans lazily anyway.
    let moderation = ModerationUseCase::new(auth_repo.clone());
    match moderation.sweep_expired_bans().await {
        Ok(cleared) => {
            tracing::info!(bans_cleared = cleared, "Startup ban sweep completed");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Startup ban sweep failed, continuing anyway");
        }
    }

    // Hourly housekeeping sweep
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(BAN_SWEEP_INTERVAL);
        ticker.tick().await; // first tick fires immediately; startup already swept
        loop {
            ticker.tick().await;
            if let Err(e) = moderation.sweep_expired_bans().await {
                tracing::warn!(error = %e, "Hourly ban sweep failed");
            }
        }
    });

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest(
            "/api/auth",
            auth::auth_router(PgAuthRepository::new(pool.clone()), auth_config),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 31113));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Decode a base64-encoded 32-byte secret from the environment
fn secret_from_env(name: &str) -> anyhow::Result<[u8; 32]> {
    let encoded =
        env::var(name).unwrap_or_else(|_| panic!("{} must be set in production", name));
    let bytes = Engine::decode(&general_purpose::STANDARD, &encoded)?;
    let secret: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("{} must decode to exactly 32 bytes", name))?;
    Ok(secret)
}
