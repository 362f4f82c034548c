//! Sign Out Use Case
//!
//! Two strengths of sign-out. Plain sign-out only unpins the refresh
//! token: outstanding access tokens ride out their short TTL, which
//! keeps the operation a single cheap write. Sign-out-everywhere
//! rotates the epoch and kills everything at once.

use std::sync::Arc;

use crate::domain::entity::user::User;
use crate::domain::repository::UserRepository;
use crate::error::AuthResult;

/// Sign out use case
pub struct SignOutUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
}

impl<U> SignOutUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    /// Sign out: end the refresh chain, let access tokens expire
    pub async fn execute(&self, mut user: User) -> AuthResult<()> {
        user.clear_refresh_token();
        self.user_repo.update(&user).await?;

        tracing::info!(user_id = %user.user_id, "User signed out");
        Ok(())
    }

    /// Sign out everywhere: rotate the epoch, every token dies now
    pub async fn execute_everywhere(&self, mut user: User) -> AuthResult<()> {
        user.bump_epoch();
        user.clear_refresh_token();
        self.user_repo.update(&user).await?;

        tracing::info!(user_id = %user.user_id, "User signed out everywhere");
        Ok(())
    }
}
