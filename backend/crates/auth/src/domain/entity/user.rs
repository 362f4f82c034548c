//! User Entity
//!
//! Single user record carrying identity, credential, and trust state.
//! The epoch and the pinned refresh token are the two server-side
//! anchors that stateless bearer tokens are checked against.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::crypto;
use platform::password::HashedPassword;

use crate::domain::value_object::{ban::BanState, email::Email, user_role::UserRole};

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    /// Internal UUID identifier
    pub user_id: UserId,
    /// Login email (unique, normalized)
    pub email: Email,
    /// Argon2id password hash
    pub password_hash: HashedPassword,
    /// Revocation epoch; tokens minted under an older value are dead
    pub epoch: i64,
    /// The one live refresh token, pinned verbatim; None when signed out
    pub refresh_token: Option<String>,
    /// Ban columns
    pub ban: BanState,
    /// Role (User, Moderator, Admin)
    pub role: UserRole,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh random epoch
    pub fn new(email: Email, password_hash: HashedPassword) -> Self {
        let now = Utc::now();

        Self {
            user_id: UserId::new(),
            email,
            password_hash,
            epoch: crypto::random_epoch(),
            refresh_token: None,
            ban: BanState::clear(),
            role: UserRole::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rotate the epoch, invalidating every outstanding token
    ///
    /// Loops until the new value differs from the old one, so a bump is
    /// never a no-op.
    pub fn bump_epoch(&mut self) {
        let old = self.epoch;
        let mut next = crypto::random_epoch();
        while next == old {
            next = crypto::random_epoch();
        }
        self.epoch = next;
        self.updated_at = Utc::now();
    }

    /// Pin a refresh token as the single live one
    pub fn pin_refresh_token(&mut self, token: String) {
        self.refresh_token = Some(token);
        self.updated_at = Utc::now();
    }

    /// Unpin the refresh token (sign-out on this device)
    pub fn clear_refresh_token(&mut self) {
        self.refresh_token = None;
        self.updated_at = Utc::now();
    }

    /// Replace the password hash
    pub fn set_password(&mut self, password_hash: HashedPassword) {
        self.password_hash = password_hash;
        self.updated_at = Utc::now();
    }

    /// Replace the login email
    pub fn set_email(&mut self, email: Email) {
        self.email = email;
        self.updated_at = Utc::now();
    }

    /// Apply a ban; `None` expiry means permanent
    pub fn apply_ban(&mut self, reason: Option<String>, expires_at: Option<DateTime<Utc>>) {
        self.ban = BanState::banned(reason, expires_at);
        self.updated_at = Utc::now();
    }

    /// Clear the ban columns
    pub fn lift_ban(&mut self) {
        self.ban = BanState::clear();
        self.updated_at = Utc::now();
    }

    /// Update user role
    pub fn set_role(&mut self, role: UserRole) {
        self.role = role;
        self.updated_at = Utc::now();
    }
}
