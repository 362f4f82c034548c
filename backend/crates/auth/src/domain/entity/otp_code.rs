//! One-Time Code Entity
//!
//! A short-lived six-digit code tied to one user. Only the SHA-256 hash
//! of the code is ever stored; the plaintext exists only in the delivery
//! channel. At most one code is live per user, enforced by the engine's
//! delete-then-insert discipline.

use chrono::{DateTime, Duration, Utc};
use kernel::id::{OtpId, UserId};
use platform::crypto;

/// One-time code entity (hash at rest, never the code itself)
#[derive(Debug, Clone)]
pub struct OtpCode {
    pub otp_id: OtpId,
    /// User the code was issued to
    pub owner: UserId,
    /// SHA-256 of the six ASCII digits
    pub code_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpCode {
    /// How long a code stays verifiable
    pub const TTL_MINUTES: i64 = 10;

    /// Minimum gap between two issuances for the same user
    pub const MIN_INTERVAL_MINUTES: i64 = 2;

    /// Create a code record from the plaintext about to be delivered
    pub fn new(owner: UserId, code: &str) -> Self {
        Self::new_at(owner, code, Utc::now())
    }

    /// Create with an explicit clock, so expiry behavior is testable
    pub fn new_at(owner: UserId, code: &str, now: DateTime<Utc>) -> Self {
        Self {
            otp_id: OtpId::new(),
            owner,
            code_hash: crypto::sha256(code.as_bytes()).to_vec(),
            created_at: now,
            expires_at: now + Duration::minutes(Self::TTL_MINUTES),
        }
    }

    /// Compare a submitted code against the stored hash in constant time
    pub fn matches(&self, code: &str) -> bool {
        let submitted = crypto::sha256(code.as_bytes());
        crypto::constant_time_eq(&submitted, &self.code_hash)
    }

    /// Whether the code is past its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether this code is recent enough to throttle a new issuance
    pub fn throttles(&self, now: DateTime<Utc>) -> bool {
        now < self.created_at + Duration::minutes(Self::MIN_INTERVAL_MINUTES)
    }
}
