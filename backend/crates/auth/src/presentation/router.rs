//! Auth Router

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::delivery::OtpDelivery;
use crate::domain::repository::{ContentRepository, OtpRepository, UserRepository};
use crate::infra::delivery::TracingOtpDelivery;
use crate::infra::postgres::PgAuthRepository;
use crate::presentation::handlers::{self, AuthAppState};

/// Create the Auth router with PostgreSQL repository and log delivery
pub fn auth_router(repo: PgAuthRepository, config: AuthConfig) -> Router {
    auth_router_generic(repo, TracingOtpDelivery, config)
}

/// Create a generic Auth router for any repository/delivery implementation
pub fn auth_router_generic<R, D>(repo: R, delivery: D, config: AuthConfig) -> Router
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let state = AuthAppState {
        repo: Arc::new(repo),
        delivery: Arc::new(delivery),
        config: Arc::new(config),
    };

    Router::new()
        .route("/signup", post(handlers::sign_up::<R, D>))
        .route("/signin", post(handlers::sign_in::<R, D>))
        .route("/signout", post(handlers::sign_out::<R, D>))
        .route("/signout/all", post(handlers::sign_out_everywhere::<R, D>))
        .route("/refresh", post(handlers::refresh_session::<R, D>))
        .route("/status", get(handlers::session_status::<R, D>))
        .route("/otp", post(handlers::otp_generate::<R, D>))
        .route("/otp/request", post(handlers::otp_request::<R, D>))
        .route("/password", post(handlers::change_password::<R, D>))
        .route("/email", post(handlers::change_email::<R, D>))
        .route("/account", delete(handlers::delete_account::<R, D>))
        .route("/moderation/ban", post(handlers::ban_user::<R, D>))
        .route("/moderation/unban", post(handlers::unban_user::<R, D>))
        .route("/moderation/banned", get(handlers::list_banned::<R, D>))
        .with_state(state)
}
