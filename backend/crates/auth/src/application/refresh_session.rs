//! Refresh Session Use Case
//!
//! Mints a new token pair from a refresh token. Three checks in order:
//! the signature/expiry (codec), the pin (this exact token is the one
//! live on the record), and the epoch. Rotation then pins the new
//! refresh token, so the one just spent can never be replayed.

use std::sync::Arc;

use kernel::id::UserId;
use platform::crypto;

use crate::application::authenticate::pass_ban_gate;
use crate::application::config::AuthConfig;
use crate::domain::repository::UserRepository;
use crate::error::{AuthError, AuthResult};

/// Refresh output: the replacement pair
pub struct RefreshOutput {
    pub access_token: String,
    pub refresh_token: String,
}

/// Refresh session use case
pub struct RefreshSessionUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<AuthConfig>,
}

impl<U> RefreshSessionUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<AuthConfig>) -> Self {
        Self { user_repo, config }
    }

    pub async fn execute(&self, refresh_token: &str) -> AuthResult<RefreshOutput> {
        let claims = self.config.refresh_codec().verify(refresh_token)?;

        let user_id = UserId::from_uuid(claims.sub);
        let user = self
            .user_repo
            .find_by_id(&user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // Pin check: only the most recently issued refresh token is
        // live. A valid signature on an unpinned token means it was
        // rotated away or the user signed out.
        let pinned = user.refresh_token.as_deref().ok_or(AuthError::Revoked)?;
        if !crypto::constant_time_eq(pinned.as_bytes(), refresh_token.as_bytes()) {
            return Err(AuthError::Revoked);
        }

        if claims.epoch != user.epoch {
            return Err(AuthError::Revoked);
        }

        let mut user = pass_ban_gate(self.user_repo.as_ref(), user).await?;

        let access_token = self
            .config
            .access_codec()
            .issue(user.user_id.into_uuid(), user.epoch);
        let new_refresh = self
            .config
            .refresh_codec()
            .issue(user.user_id.into_uuid(), user.epoch);

        user.pin_refresh_token(new_refresh.clone());
        self.user_repo.update(&user).await?;

        tracing::debug!(user_id = %user.user_id, "Session refreshed");

        Ok(RefreshOutput {
            access_token,
            refresh_token: new_refresh,
        })
    }
}
