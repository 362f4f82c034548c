//! Ban State Value Object
//!
//! A user's ban is three columns on the user record: a flag, a reason,
//! and an optional expiry. Evaluation is a pure function of the state
//! and a clock; persistence of an expired-ban cleanup is the caller's
//! concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason recorded when a moderator bans without giving one
pub const DEFAULT_BAN_REASON: &str = "Violation of terms";

/// Ban columns of a user record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BanState {
    pub is_banned: bool,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of evaluating a ban against a clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BanDecision {
    /// Not banned
    Allowed,
    /// Banned, but the ban has lapsed; caller should persist the cleanup
    AllowedExpired,
    /// Banned and in force
    Blocked {
        reason: String,
        until: Option<DateTime<Utc>>,
    },
}

impl BanState {
    /// State of a user with no ban
    pub fn clear() -> Self {
        Self::default()
    }

    /// State of a freshly banned user; `None` expiry means permanent
    pub fn banned(reason: Option<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            is_banned: true,
            reason: Some(reason.unwrap_or_else(|| DEFAULT_BAN_REASON.to_string())),
            expires_at,
        }
    }

    /// Evaluate the ban at a given instant
    ///
    /// A temporary ban whose expiry has passed counts as allowed. The
    /// flag stays set in this value; see [`BanDecision::AllowedExpired`].
    pub fn evaluate(&self, now: DateTime<Utc>) -> BanDecision {
        if !self.is_banned {
            return BanDecision::Allowed;
        }

        match self.expires_at {
            Some(expiry) if expiry <= now => BanDecision::AllowedExpired,
            until => BanDecision::Blocked {
                reason: self
                    .reason
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BAN_REASON.to_string()),
                until,
            },
        }
    }
}
