//! Step-Up Authorizer
//!
//! Sensitive mutations require more than a live session: the caller
//! must re-present the password and a fresh one-time code. The pipeline
//! is re-derived on every call; passing it once buys nothing for the
//! next request. The [`StepUpPass`] proof is deliberately not `Clone`
//! and carries the user by value, so it cannot outlive the request that
//! earned it.

use std::sync::Arc;

use platform::password::ClearTextPassword;

use crate::application::authenticate::pass_ban_gate;
use crate::application::config::AuthConfig;
use crate::application::otp::OtpEngine;
use crate::domain::delivery::OtpDelivery;
use crate::domain::entity::user::User;
use crate::domain::repository::{OtpRepository, UserRepository};
use crate::error::{AuthError, AuthResult};

/// Credentials re-presented for a sensitive operation
pub struct StepUpInput {
    pub current_password: String,
    pub otp_code: String,
}

/// Proof that the full step-up pipeline passed, scoped to one request
pub struct StepUpPass {
    user: User,
}

impl StepUpPass {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn into_user(self) -> User {
        self.user
    }

    /// Bypass the pipeline; tests that exercise what comes after it
    #[cfg(test)]
    pub(crate) fn issue_for_tests(user: User) -> Self {
        Self { user }
    }
}

/// Step-up authorizer
pub struct StepUpUseCase<U, O, D>
where
    U: UserRepository,
    O: OtpRepository,
    D: OtpDelivery,
{
    user_repo: Arc<U>,
    otp_engine: Arc<OtpEngine<O, U, D>>,
    config: Arc<AuthConfig>,
}

impl<U, O, D> StepUpUseCase<U, O, D>
where
    U: UserRepository,
    O: OtpRepository,
    D: OtpDelivery,
{
    pub fn new(
        user_repo: Arc<U>,
        otp_engine: Arc<OtpEngine<O, U, D>>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            user_repo,
            otp_engine,
            config,
        }
    }

    /// Run the pipeline for an already-authenticated user
    ///
    /// Order matters: ban, then password, then code. The code is only
    /// consumed if everything before it held, and the caller performs
    /// no side effects until this returns Ok.
    pub async fn execute(&self, user: User, input: StepUpInput) -> AuthResult<StepUpPass> {
        let user = pass_ban_gate(self.user_repo.as_ref(), user).await?;

        let password = ClearTextPassword::new_unchecked(input.current_password);
        if !user.password_hash.verify(&password, self.config.pepper()) {
            return Err(AuthError::WrongPassword);
        }

        self.otp_engine.verify(&user.user_id, &input.otp_code).await?;

        Ok(StepUpPass { user })
    }
}
