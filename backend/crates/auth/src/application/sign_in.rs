//! Sign In Use Case
//!
//! Authenticates credentials and issues a fresh token pair. The refresh
//! token is pinned on the user record, so signing in on a new device
//! silently ends the refresh chain of the previous one.

use std::sync::Arc;

use kernel::id::UserId;
use platform::password::ClearTextPassword;

use crate::application::config::AuthConfig;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{email::Email, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

/// Sign in output
pub struct SignInOutput {
    pub user_id: UserId,
    pub role: UserRole,
    /// Short-lived bearer token for ordinary requests
    pub access_token: String,
    /// Long-lived token, now the single pinned one
    pub refresh_token: String,
}

/// Sign in use case
pub struct SignInUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<AuthConfig>,
}

impl<U> SignInUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<AuthConfig>) -> Self {
        Self { user_repo, config }
    }

    pub async fn execute(&self, input: SignInInput) -> AuthResult<SignInOutput> {
        // Lookup failure and password failure collapse to the same
        // error, so the endpoint cannot be used to probe for accounts.
        let email = Email::new(input.email).map_err(|_| AuthError::WrongPassword)?;

        let mut user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::WrongPassword)?;

        let password = ClearTextPassword::new_unchecked(input.password);
        if !user.password_hash.verify(&password, self.config.pepper()) {
            return Err(AuthError::WrongPassword);
        }

        let access_token = self
            .config
            .access_codec()
            .issue(user.user_id.into_uuid(), user.epoch);
        let refresh_token = self
            .config
            .refresh_codec()
            .issue(user.user_id.into_uuid(), user.epoch);

        user.pin_refresh_token(refresh_token.clone());
        self.user_repo.update(&user).await?;

        tracing::info!(user_id = %user.user_id, "User signed in");

        Ok(SignInOutput {
            user_id: user.user_id,
            role: user.role,
            access_token,
            refresh_token,
        })
    }
}
