//! One-Time Code Engine
//!
//! Issues and verifies six-digit codes. Delete-then-insert on issuance
//! keeps at most one code live per user; deletion on successful
//! verification makes each code single-use.

use std::sync::Arc;

use chrono::Utc;
use kernel::id::UserId;
use platform::crypto;

use crate::domain::delivery::OtpDelivery;
use crate::domain::entity::{otp_code::OtpCode, user::User};
use crate::domain::repository::{OtpRepository, UserRepository};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// One-time code engine
pub struct OtpEngine<O, U, D>
where
    O: OtpRepository,
    U: UserRepository,
    D: OtpDelivery,
{
    otp_repo: Arc<O>,
    user_repo: Arc<U>,
    delivery: Arc<D>,
}

impl<O, U, D> OtpEngine<O, U, D>
where
    O: OtpRepository,
    U: UserRepository,
    D: OtpDelivery,
{
    pub fn new(otp_repo: Arc<O>, user_repo: Arc<U>, delivery: Arc<D>) -> Self {
        Self {
            otp_repo,
            user_repo,
            delivery,
        }
    }

    /// Issue a fresh code for the user and hand it to the delivery channel
    pub async fn generate(&self, user: &User) -> AuthResult<()> {
        let now = Utc::now();

        // Throttle on the latest code's creation time, expired or not.
        if let Some(latest) = self.otp_repo.find_latest_by_owner(&user.user_id).await?
            && latest.throttles(now)
        {
            return Err(AuthError::OtpThrottled);
        }

        let code = crypto::random_six_digit_code();
        let record = OtpCode::new_at(user.user_id, &code, now);

        // Delete-then-insert: the new code is the only live one.
        self.otp_repo.delete_all_by_owner(&user.user_id).await?;
        self.otp_repo.insert(&record).await?;

        // The code is already committed; a dead channel must not
        // surface as an error distinguishable from success.
        if let Err(e) = self.delivery.send_code(&user.email, &code).await {
            tracing::warn!(user_id = %user.user_id, error = %e, "One-time code delivery failed");
        }

        tracing::info!(user_id = %user.user_id, "One-time code issued");
        Ok(())
    }

    /// Issue a code addressed by stored email (forgot-password entry)
    pub async fn generate_for_email(&self, email: &Email) -> AuthResult<()> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.generate(&user).await
    }

    /// Verify a submitted code; consumes it on success
    ///
    /// Checks run in order: existence, expiry, match. A malformed
    /// submission falls through to the hash compare, so it reports
    /// the same way as any other wrong code.
    pub async fn verify(&self, owner: &UserId, code: &str) -> AuthResult<()> {
        let record = self
            .otp_repo
            .find_latest_by_owner(owner)
            .await?
            .ok_or(AuthError::OtpNotFound)?;

        if record.is_expired(Utc::now()) {
            return Err(AuthError::OtpExpired);
        }

        if !record.matches(code) {
            return Err(AuthError::OtpMismatch);
        }

        // Single-use: a verified code is gone before the caller sees Ok.
        self.otp_repo.delete_all_by_owner(owner).await?;

        tracing::debug!(user_id = %owner, "One-time code verified");
        Ok(())
    }
}
