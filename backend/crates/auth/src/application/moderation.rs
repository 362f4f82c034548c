//! Moderation Use Case
//!
//! Ban and unban by moderators, plus the hourly sweep that clears
//! lapsed temporary bans in bulk. A ban also rotates the target's epoch
//! and unpins their refresh token, so they are logged out everywhere
//! the moment the ban lands.

use std::sync::Arc;

use chrono::{Duration, Utc};
use kernel::id::UserId;

use crate::domain::entity::user::User;
use crate::domain::repository::UserRepository;
use crate::error::{AuthError, AuthResult};

/// Ban input
pub struct BanInput {
    pub target: UserId,
    pub reason: Option<String>,
    /// Ban length in hours; `None` means permanent
    pub duration_hours: Option<i64>,
}

/// Moderation use case
pub struct ModerationUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
}

impl<U> ModerationUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    /// Ban a user and force them out of every session
    pub async fn ban(&self, input: BanInput) -> AuthResult<()> {
        let mut user = self
            .user_repo
            .find_by_id(&input.target)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let expires_at = input.duration_hours.map(|h| Utc::now() + Duration::hours(h));

        user.apply_ban(input.reason, expires_at);
        user.bump_epoch();
        user.clear_refresh_token();
        self.user_repo.update(&user).await?;

        tracing::info!(
            user_id = %user.user_id,
            permanent = expires_at.is_none(),
            "User banned"
        );
        Ok(())
    }

    /// Lift a ban early
    pub async fn unban(&self, target: &UserId) -> AuthResult<()> {
        let mut user = self
            .user_repo
            .find_by_id(target)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.ban.is_banned {
            return Err(AuthError::NotBanned);
        }

        user.lift_ban();
        self.user_repo.update(&user).await?;

        tracing::info!(user_id = %user.user_id, "User unbanned");
        Ok(())
    }

    /// All currently banned users
    pub async fn list_banned(&self) -> AuthResult<Vec<User>> {
        self.user_repo.find_banned().await
    }

    /// Clear every lapsed temporary ban; returns the number cleared
    ///
    /// Housekeeping only. Correctness never depends on this running:
    /// the ban gate clears lapsed bans lazily on access.
    pub async fn sweep_expired_bans(&self) -> AuthResult<u64> {
        let cleared = self.user_repo.clear_expired_bans(Utc::now()).await?;

        if cleared > 0 {
            tracing::info!(cleared = cleared, "Expired bans swept");
        }
        Ok(cleared)
    }
}
