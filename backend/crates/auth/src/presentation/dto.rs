//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::TeardownSummary;
use crate::domain::entity::user::User;

// ============================================================================
// Sign Up / Sign In
// ============================================================================

/// Sign up request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
}

/// Sign up response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub user_id: Uuid,
}

/// Sign in request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Sign in response (tokens travel in cookies)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user_id: Uuid,
    pub role: String,
}

// ============================================================================
// Session Status
// ============================================================================

/// Session status response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub authenticated: bool,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl SessionStatusResponse {
    pub fn authenticated(user: &User) -> Self {
        Self {
            authenticated: true,
            user_id: Some(*user.user_id.as_uuid()),
            email: Some(user.email.as_str().to_string()),
            role: Some(user.role.code().to_string()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: None,
            email: None,
            role: None,
        }
    }
}

// ============================================================================
// One-Time Codes
// ============================================================================

/// Unauthenticated code request (forgot-password entry)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequestByEmail {
    pub email: String,
}

// ============================================================================
// Sensitive Mutations (step-up gated)
// ============================================================================

/// Change password request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Current password, re-presented for step-up
    pub current_password: String,
    /// Fresh one-time code
    pub otp_code: String,
    pub new_password: String,
}

/// Change email request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEmailRequest {
    pub current_password: String,
    pub otp_code: String,
    pub new_email: String,
}

/// Delete account request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    pub current_password: String,
    pub otp_code: String,
}

/// Delete account response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountResponse {
    pub deleted: TeardownSummary,
}

// ============================================================================
// Moderation
// ============================================================================

/// Ban request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRequest {
    pub user_id: Uuid,
    pub reason: Option<String>,
    /// Ban length in hours; omit for permanent
    pub duration_hours: Option<i64>,
}

/// Unban request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnbanRequest {
    pub user_id: Uuid,
}

/// Banned user entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedUserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BannedUserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: *user.user_id.as_uuid(),
            email: user.email.as_str().to_string(),
            reason: user.ban.reason.clone(),
            expires_at: user.ban.expires_at,
        }
    }
}
