//! Auth Middleware
//!
//! Middleware for requiring authentication on protected routes. Runs
//! the same token-epoch-ban gate as the handlers and stashes the
//! admitted user in request extensions for downstream use.

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::application::AuthenticateUseCase;
use crate::application::config::AuthConfig;
use crate::domain::entity::user::User;
use crate::domain::repository::UserRepository;
use crate::error::AuthError;
use crate::presentation::handlers::extract_bearer;

/// Middleware state
#[derive(Clone)]
pub struct AuthMiddlewareState<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    pub user_repo: Arc<U>,
    pub config: Arc<AuthConfig>,
}

/// Authenticated user stored in request extensions
#[derive(Clone)]
pub struct CurrentUser(pub Arc<User>);

/// Middleware that requires a valid, unrevoked, unbanned bearer
pub async fn require_auth<U>(
    state: AuthMiddlewareState<U>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response>
where
    U: UserRepository + Send + Sync + 'static,
{
    let token = extract_bearer(req.headers(), &state.config)
        .ok_or_else(|| AuthError::TokenMalformed.into_response())?;

    let user = AuthenticateUseCase::new(state.user_repo.clone(), state.config.clone())
        .execute(&token)
        .await
        .map_err(|e| e.into_response())?;

    req.extensions_mut().insert(CurrentUser(Arc::new(user)));

    Ok(next.run(req).await)
}
