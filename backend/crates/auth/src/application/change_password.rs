//! Change Password Use Case
//!
//! Step-up gated. A successful change rotates the epoch and unpins the
//! refresh token: every session, including the one that made the
//! change, has to sign in again with the new password.

use std::sync::Arc;

use platform::password::ClearTextPassword;

use crate::application::config::AuthConfig;
use crate::application::step_up::StepUpPass;
use crate::domain::repository::UserRepository;
use crate::error::{AuthError, AuthResult};

/// Change password use case
pub struct ChangePasswordUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<AuthConfig>,
}

impl<U> ChangePasswordUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<AuthConfig>) -> Self {
        Self { user_repo, config }
    }

    pub async fn execute(&self, pass: StepUpPass, new_password: String) -> AuthResult<()> {
        let mut user = pass.into_user();

        // The step-up pipeline already proved the current password;
        // reusing it as the new one is rejected before any hashing.
        let candidate = ClearTextPassword::new_unchecked(new_password.clone());
        if user.password_hash.verify(&candidate, self.config.pepper()) {
            return Err(AuthError::SamePassword);
        }

        let new_password = ClearTextPassword::new(new_password)
            .map_err(|e| AuthError::PasswordValidation(e.to_string()))?;

        let new_hash = new_password
            .hash(self.config.pepper())
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        user.set_password(new_hash);
        user.bump_epoch();
        user.clear_refresh_token();
        self.user_repo.update(&user).await?;

        tracing::info!(user_id = %user.user_id, "Password changed, all sessions revoked");
        Ok(())
    }
}
