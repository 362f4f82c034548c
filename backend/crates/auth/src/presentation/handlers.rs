//! HTTP Handlers
//!
//! Tokens travel as HttpOnly cookies, with an Authorization bearer
//! header accepted as a fallback for non-browser clients. Handlers that
//! guard sensitive mutations run the full step-up pipeline before any
//! side effect.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse};
use std::sync::Arc;

use kernel::id::UserId;
use platform::cookie::CookieConfig;

use crate::application::config::AuthConfig;
use crate::application::{
    AuthenticateUseCase, BanInput, ChangeEmailUseCase, ChangePasswordUseCase, DeleteAccountUseCase,
    ModerationUseCase, OtpEngine, RefreshSessionUseCase, SignInInput, SignInUseCase,
    SignOutUseCase, SignUpInput, SignUpUseCase, StepUpInput, StepUpPass, StepUpUseCase,
};
use crate::domain::delivery::OtpDelivery;
use crate::domain::entity::user::User;
use crate::domain::repository::{ContentRepository, OtpRepository, UserRepository};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    BanRequest, BannedUserResponse, ChangeEmailRequest, ChangePasswordRequest,
    DeleteAccountRequest, DeleteAccountResponse, OtpRequestByEmail, SessionStatusResponse,
    SignInRequest, SignInResponse, SignUpRequest, SignUpResponse, UnbanRequest,
};

/// Shared state for auth handlers
pub struct AuthAppState<R, D>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub delivery: Arc<D>,
    pub config: Arc<AuthConfig>,
}

impl<R, D> Clone for AuthAppState<R, D>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            delivery: self.delivery.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R, D> AuthAppState<R, D>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    fn otp_engine(&self) -> Arc<OtpEngine<R, R, D>> {
        Arc::new(OtpEngine::new(
            self.repo.clone(),
            self.repo.clone(),
            self.delivery.clone(),
        ))
    }

    /// Admit the request's bearer token through the full per-request gate
    async fn authenticate(&self, headers: &HeaderMap) -> AuthResult<User> {
        let token = extract_bearer(headers, &self.config).ok_or(AuthError::TokenMalformed)?;
        AuthenticateUseCase::new(self.repo.clone(), self.config.clone())
            .execute(&token)
            .await
    }

    /// Authenticate, then run the step-up pipeline
    async fn step_up(
        &self,
        headers: &HeaderMap,
        input: StepUpInput,
    ) -> AuthResult<StepUpPass> {
        let user = self.authenticate(headers).await?;
        StepUpUseCase::new(self.repo.clone(), self.otp_engine(), self.config.clone())
            .execute(user, input)
            .await
    }
}

// ============================================================================
// Sign Up / Sign In
// ============================================================================

/// POST /api/auth/signup
pub async fn sign_up<R, D>(
    State(state): State<AuthAppState<R, D>>,
    Json(req): Json<SignUpRequest>,
) -> AuthResult<(StatusCode, Json<SignUpResponse>)>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let use_case = SignUpUseCase::new(state.repo.clone(), state.config.clone());

    let output = use_case
        .execute(SignUpInput {
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user_id: output.user_id.into_uuid(),
        }),
    ))
}

/// POST /api/auth/signin
pub async fn sign_in<R, D>(
    State(state): State<AuthAppState<R, D>>,
    Json(req): Json<SignInRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let use_case = SignInUseCase::new(state.repo.clone(), state.config.clone());

    let output = use_case
        .execute(SignInInput {
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok((
        set_token_cookies(&state.config, &output.access_token, &output.refresh_token),
        Json(SignInResponse {
            user_id: output.user_id.into_uuid(),
            role: output.role.code().to_string(),
        }),
    ))
}

// ============================================================================
// Sign Out
// ============================================================================

/// POST /api/auth/signout
pub async fn sign_out<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    // A dead or revoked token still gets its cookies cleared, that is
    // the whole point of signing out. A failed unpin write is different:
    // the refresh chain is still live server-side, so the client must
    // not be told the sign-out took.
    if let Ok(user) = state.authenticate(&headers).await {
        SignOutUseCase::new(state.repo.clone()).execute(user).await?;
    }

    Ok((StatusCode::NO_CONTENT, clear_token_cookies(&state.config)))
}

/// POST /api/auth/signout/all
pub async fn sign_out_everywhere<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let user = state.authenticate(&headers).await?;
    SignOutUseCase::new(state.repo.clone())
        .execute_everywhere(user)
        .await?;

    Ok((StatusCode::NO_CONTENT, clear_token_cookies(&state.config)))
}

// ============================================================================
// Refresh
// ============================================================================

/// POST /api/auth/refresh
pub async fn refresh_session<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let token = platform::cookie::extract_cookie(&headers, &state.config.refresh_cookie_name)
        .ok_or(AuthError::TokenMalformed)?;

    let output = RefreshSessionUseCase::new(state.repo.clone(), state.config.clone())
        .execute(&token)
        .await?;

    Ok((
        StatusCode::NO_CONTENT,
        set_token_cookies(&state.config, &output.access_token, &output.refresh_token),
    ))
}

// ============================================================================
// Session Status
// ============================================================================

/// GET /api/auth/status
pub async fn session_status<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
) -> Json<SessionStatusResponse>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    match state.authenticate(&headers).await {
        Ok(user) => Json(SessionStatusResponse::authenticated(&user)),
        Err(_) => Json(SessionStatusResponse::anonymous()),
    }
}

// ============================================================================
// One-Time Codes
// ============================================================================

/// POST /api/auth/otp (authenticated)
pub async fn otp_generate<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
) -> AuthResult<StatusCode>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let user = state.authenticate(&headers).await?;
    state.otp_engine().generate(&user).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/auth/otp/request (unauthenticated, forgot-password entry)
pub async fn otp_request<R, D>(
    State(state): State<AuthAppState<R, D>>,
    Json(req): Json<OtpRequestByEmail>,
) -> AuthResult<StatusCode>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let email = Email::new(req.email).map_err(|e| AuthError::InvalidEmail(e.to_string()))?;
    state.otp_engine().generate_for_email(&email).await?;
    Ok(StatusCode::ACCEPTED)
}

// ============================================================================
// Sensitive Mutations (step-up gated)
// ============================================================================

/// POST /api/auth/password
pub async fn change_password<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let pass = state
        .step_up(
            &headers,
            StepUpInput {
                current_password: req.current_password,
                otp_code: req.otp_code,
            },
        )
        .await?;

    ChangePasswordUseCase::new(state.repo.clone(), state.config.clone())
        .execute(pass, req.new_password)
        .await?;

    // The epoch just rotated; the cookies this request carried are dead.
    Ok((StatusCode::NO_CONTENT, clear_token_cookies(&state.config)))
}

/// POST /api/auth/email
pub async fn change_email<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
    Json(req): Json<ChangeEmailRequest>,
) -> AuthResult<StatusCode>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let pass = state
        .step_up(
            &headers,
            StepUpInput {
                current_password: req.current_password,
                otp_code: req.otp_code,
            },
        )
        .await?;

    ChangeEmailUseCase::new(state.repo.clone())
        .execute(pass, req.new_email)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/auth/account
pub async fn delete_account<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
    Json(req): Json<DeleteAccountRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let pass = state
        .step_up(
            &headers,
            StepUpInput {
                current_password: req.current_password,
                otp_code: req.otp_code,
            },
        )
        .await?;

    let summary =
        DeleteAccountUseCase::new(state.repo.clone(), state.repo.clone(), state.repo.clone())
            .execute(pass)
            .await?;

    Ok((
        clear_token_cookies(&state.config),
        Json(DeleteAccountResponse { deleted: summary }),
    ))
}

// ============================================================================
// Moderation
// ============================================================================

/// POST /api/auth/moderation/ban
pub async fn ban_user<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
    Json(req): Json<BanRequest>,
) -> AuthResult<StatusCode>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let moderator = state.authenticate(&headers).await?;
    require_moderator(&moderator)?;

    ModerationUseCase::new(state.repo.clone())
        .ban(BanInput {
            target: UserId::from_uuid(req.user_id),
            reason: req.reason,
            duration_hours: req.duration_hours,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/moderation/unban
pub async fn unban_user<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
    Json(req): Json<UnbanRequest>,
) -> AuthResult<StatusCode>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let moderator = state.authenticate(&headers).await?;
    require_moderator(&moderator)?;

    ModerationUseCase::new(state.repo.clone())
        .unban(&UserId::from_uuid(req.user_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/moderation/banned
pub async fn list_banned<R, D>(
    State(state): State<AuthAppState<R, D>>,
    headers: HeaderMap,
) -> AuthResult<Json<Vec<BannedUserResponse>>>
where
    R: UserRepository + OtpRepository + ContentRepository + Send + Sync + 'static,
    D: OtpDelivery + Send + Sync + 'static,
{
    let moderator = state.authenticate(&headers).await?;
    require_moderator(&moderator)?;

    let banned = ModerationUseCase::new(state.repo.clone())
        .list_banned()
        .await?;

    Ok(Json(
        banned.iter().map(BannedUserResponse::from_user).collect(),
    ))
}

fn require_moderator(user: &User) -> AuthResult<()> {
    if user.role.is_moderator_or_higher() {
        Ok(())
    } else {
        Err(AuthError::InsufficientRole)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Access token from the cookie, falling back to an Authorization header
pub(crate) fn extract_bearer(headers: &HeaderMap, config: &AuthConfig) -> Option<String> {
    platform::cookie::extract_cookie(headers, &config.access_cookie_name).or_else(|| {
        headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
            .map(str::to_string)
    })
}

fn cookie_for(config: &AuthConfig, name: &str, max_age_secs: i64) -> CookieConfig {
    CookieConfig {
        name: name.to_string(),
        secure: config.cookie_secure,
        http_only: true,
        same_site: config.cookie_same_site,
        path: "/".to_string(),
        max_age_secs: Some(max_age_secs),
    }
}

fn set_token_cookies(
    config: &AuthConfig,
    access_token: &str,
    refresh_token: &str,
) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    let access = cookie_for(config, &config.access_cookie_name, config.access_ttl_secs());
    let refresh = cookie_for(
        config,
        &config.refresh_cookie_name,
        config.refresh_ttl_secs(),
    );

    AppendHeaders([
        (header::SET_COOKIE, access.build_set_cookie(access_token)),
        (header::SET_COOKIE, refresh.build_set_cookie(refresh_token)),
    ])
}

pub(crate) fn clear_token_cookies(
    config: &AuthConfig,
) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    let access = cookie_for(config, &config.access_cookie_name, 0);
    let refresh = cookie_for(config, &config.refresh_cookie_name, 0);

    AppendHeaders([
        (header::SET_COOKIE, access.build_delete_cookie()),
        (header::SET_COOKIE, refresh.build_delete_cookie()),
    ])
}
