//! Authenticate Use Case
//!
//! Per-request gate for bearer tokens: verify the signature, bind the
//! embedded epoch to the live user record, then evaluate the ban. Runs
//! on every authenticated request; there is no session store to consult.

use std::sync::Arc;

use chrono::Utc;
use kernel::id::UserId;

use crate::application::config::AuthConfig;
use crate::domain::entity::user::User;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::ban::BanDecision;
use crate::error::{AuthError, AuthResult};

/// Ban gate shared by every entry point that admits a user
///
/// Lapsed temporary bans are cleared lazily here: the cleanup write is
/// best-effort, and a failure to persist it must not fail the request
/// that discovered the lapse. The returned user always reflects the
/// decision (ban columns cleared on the lapsed path).
pub(crate) async fn pass_ban_gate<U: UserRepository>(
    user_repo: &U,
    mut user: User,
) -> AuthResult<User> {
    match user.ban.evaluate(Utc::now()) {
        BanDecision::Allowed => Ok(user),
        BanDecision::Blocked { reason, until } => Err(AuthError::Banned { reason, until }),
        BanDecision::AllowedExpired => {
            user.lift_ban();
            if let Err(e) = user_repo.update(&user).await {
                tracing::warn!(
                    user_id = %user.user_id,
                    error = %e,
                    "Failed to persist expired-ban cleanup, proceeding"
                );
            } else {
                tracing::info!(user_id = %user.user_id, "Expired ban cleared on access");
            }
            Ok(user)
        }
    }
}

/// Authenticate use case
pub struct AuthenticateUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<AuthConfig>,
}

impl<U> AuthenticateUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<AuthConfig>) -> Self {
        Self { user_repo, config }
    }

    /// Admit a request bearing an access token
    pub async fn execute(&self, access_token: &str) -> AuthResult<User> {
        let claims = self.config.access_codec().verify(access_token)?;

        let user_id = UserId::from_uuid(claims.sub);
        let user = self
            .user_repo
            .find_by_id(&user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // Epoch binding: a signed, unexpired token minted before the
        // last epoch rotation is dead.
        if claims.epoch != user.epoch {
            return Err(AuthError::Revoked);
        }

        pass_ban_gate(self.user_repo.as_ref(), user).await
    }
}
