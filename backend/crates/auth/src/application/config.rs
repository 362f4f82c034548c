//! Application Configuration
//!
//! Configuration for the Auth application layer. Access and refresh
//! tokens get independent secrets so one class can never verify as the
//! other even if TTLs were misconfigured.

use std::time::Duration;

use platform::token::{TokenCodec, TokenKind};

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Access token cookie name
    pub access_cookie_name: String,
    /// Refresh token cookie name
    pub refresh_cookie_name: String,
    /// Access token signing secret (32 bytes)
    pub access_secret: [u8; 32],
    /// Refresh token signing secret (32 bytes, distinct from access)
    pub refresh_secret: [u8; 32],
    /// Access token TTL (15 minutes)
    pub access_ttl: Duration,
    /// Refresh token TTL (7 days)
    pub refresh_ttl: Duration,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_cookie_name: "access_token".to_string(),
            refresh_cookie_name: "refresh_token".to_string(),
            access_secret: [0u8; 32],
            refresh_secret: [0u8; 32],
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 3600),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            password_pepper: None,
        }
    }
}

impl AuthConfig {
    /// Create config with random signing secrets (for development)
    pub fn with_random_secrets() -> Self {
        use rand::RngCore;
        use rand::rngs::OsRng;

        let mut access_secret = [0u8; 32];
        let mut refresh_secret = [0u8; 32];
        OsRng.fill_bytes(&mut access_secret);
        OsRng.fill_bytes(&mut refresh_secret);

        Self {
            access_secret,
            refresh_secret,
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secrets()
        }
    }

    /// Codec for access tokens
    pub fn access_codec(&self) -> TokenCodec {
        TokenCodec::new(
            TokenKind::Access,
            self.access_secret,
            chrono::Duration::seconds(self.access_ttl.as_secs() as i64),
        )
    }

    /// Codec for refresh tokens
    pub fn refresh_codec(&self) -> TokenCodec {
        TokenCodec::new(
            TokenKind::Refresh,
            self.refresh_secret,
            chrono::Duration::seconds(self.refresh_ttl.as_secs() as i64),
        )
    }

    /// Get access TTL in seconds (cookie Max-Age)
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.as_secs() as i64
    }

    /// Get refresh TTL in seconds (cookie Max-Age)
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl.as_secs() as i64
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}
