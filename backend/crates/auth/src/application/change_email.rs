//! Change Email Use Case
//!
//! Step-up gated. Changing the login email does not revoke sessions;
//! the credential that tokens bind to is the epoch, not the address.

use std::sync::Arc;

use crate::application::step_up::StepUpPass;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Change email use case
pub struct ChangeEmailUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
}

impl<U> ChangeEmailUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    pub async fn execute(&self, pass: StepUpPass, new_email: String) -> AuthResult<()> {
        let new_email =
            Email::new(new_email).map_err(|e| AuthError::InvalidEmail(e.to_string()))?;

        let mut user = pass.into_user();

        if new_email == user.email {
            // No-op change; report success without a write.
            return Ok(());
        }

        if self.user_repo.exists_by_email(&new_email).await? {
            return Err(AuthError::EmailTaken);
        }

        user.set_email(new_email);
        self.user_repo.update(&user).await?;

        tracing::info!(user_id = %user.user_id, "Login email changed");
        Ok(())
    }
}
