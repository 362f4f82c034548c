//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::token::TokenError;
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token structure or payload could not be decoded
    #[error("Malformed token")]
    TokenMalformed,

    /// Token signature did not verify
    #[error("Invalid token signature")]
    TokenInvalidSignature,

    /// Token is past its expiry
    #[error("Token expired")]
    TokenExpired,

    /// Token carries a stale epoch or an unpinned refresh token
    #[error("Session revoked")]
    Revoked,

    /// User is banned and the ban has not expired
    #[error("Account is banned: {reason}")]
    Banned {
        reason: String,
        until: Option<DateTime<Utc>>,
    },

    /// Wrong password (sign-in or reconfirmation)
    #[error("Invalid credentials")]
    WrongPassword,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Email already registered
    #[error("Email already registered")]
    EmailTaken,

    /// No live one-time code for this user
    #[error("No one-time code found")]
    OtpNotFound,

    /// One-time code is past its expiry
    #[error("One-time code expired")]
    OtpExpired,

    /// One-time code did not match
    #[error("Invalid one-time code")]
    OtpMismatch,

    /// A code was issued too recently
    #[error("A one-time code was issued recently, try again later")]
    OtpThrottled,

    /// New password equals the current one
    #[error("New password must differ from the current password")]
    SamePassword,

    /// Unban requested for a user who is not banned
    #[error("User is not banned")]
    NotBanned,

    /// Caller's role does not permit the operation
    #[error("Insufficient permissions")]
    InsufficientRole,

    /// Email validation error
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password validation error
    #[error("Password validation failed: {0}")]
    PasswordValidation(String),

    /// Account teardown stopped partway; safe to retry
    #[error("Account deletion failed at step '{step}'")]
    TeardownFailed {
        step: &'static str,
        #[source]
        cause: Box<AuthError>,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Wrap an error with the teardown step it occurred in
    pub fn teardown(step: &'static str, cause: AuthError) -> Self {
        AuthError::TeardownFailed {
            step,
            cause: Box::new(cause),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::TokenMalformed
            | AuthError::TokenInvalidSignature
            | AuthError::TokenExpired
            | AuthError::Revoked
            | AuthError::WrongPassword
            | AuthError::OtpMismatch => StatusCode::UNAUTHORIZED,
            AuthError::Banned { .. } | AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::UserNotFound | AuthError::OtpNotFound => StatusCode::NOT_FOUND,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::OtpExpired => StatusCode::GONE,
            AuthError::OtpThrottled => StatusCode::TOO_MANY_REQUESTS,
            AuthError::SamePassword
            | AuthError::NotBanned
            | AuthError::InvalidEmail(_)
            | AuthError::PasswordValidation(_) => StatusCode::BAD_REQUEST,
            AuthError::TeardownFailed { .. }
            | AuthError::Database(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::TokenMalformed
            | AuthError::TokenInvalidSignature
            | AuthError::TokenExpired
            | AuthError::Revoked
            | AuthError::WrongPassword
            | AuthError::OtpMismatch => ErrorKind::Unauthorized,
            AuthError::Banned { .. } | AuthError::InsufficientRole => ErrorKind::Forbidden,
            AuthError::UserNotFound | AuthError::OtpNotFound => ErrorKind::NotFound,
            AuthError::EmailTaken => ErrorKind::Conflict,
            AuthError::OtpExpired => ErrorKind::Gone,
            AuthError::OtpThrottled => ErrorKind::TooManyRequests,
            AuthError::SamePassword
            | AuthError::NotBanned
            | AuthError::InvalidEmail(_)
            | AuthError::PasswordValidation(_) => ErrorKind::BadRequest,
            AuthError::TeardownFailed { .. }
            | AuthError::Database(_)
            | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        let app = AppError::new(self.kind(), self.to_string());
        match self {
            AuthError::Banned { until: Some(t), .. } => {
                app.with_action(format!("Ban expires at {}", t.to_rfc3339()))
            }
            AuthError::TeardownFailed { .. } => {
                app.with_action("Retry account deletion; completed steps are skipped")
            }
            _ => app,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::TeardownFailed { step, cause } => {
                tracing::error!(step = %step, cause = %cause, "Account teardown failed");
            }
            AuthError::WrongPassword => {
                tracing::warn!("Invalid credential attempt");
            }
            AuthError::Revoked => {
                tracing::warn!("Request with revoked session");
            }
            AuthError::Banned { reason, .. } => {
                tracing::warn!(reason = %reason, "Request from banned account");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AuthError::TokenMalformed,
            TokenError::InvalidSignature => AuthError::TokenInvalidSignature,
            TokenError::Expired => AuthError::TokenExpired,
        }
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
