//! Bearer Token Codec
//!
//! Compact, stateless session tokens: `base64url(payload).base64url(sig)`
//! where the signature is HMAC-SHA256 over the payload bytes. Access and
//! refresh tokens are signed with distinct secrets and carry distinct
//! expiry durations, so a leaked access token has a bounded blast radius
//! while refresh tokens survive longer.
//!
//! `verify` is a pure function of the token and the secret: no store
//! lookups, no side effects. Binding the embedded epoch to the live user
//! record is the caller's concern.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Which of the two token classes a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived credential for ordinary requests
    Access,
    /// Long-lived credential, pinned server-side, used only to mint new pairs
    Refresh,
}

impl TokenKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Token verification/decoding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Structure or payload could not be decoded
    #[error("Malformed token")]
    Malformed,

    /// HMAC signature did not verify (wrong secret, wrong kind, or tampering)
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token is past its embedded expiry
    #[error("Token expired")]
    Expired,
}

/// Signed claims carried by every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: Uuid,
    /// Revocation epoch at issuance; must equal the live user's epoch
    pub epoch: i64,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expires-at (unix seconds)
    pub exp: i64,
    /// Token class; also implied by the signing secret
    pub kind: TokenKind,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Stateless signer/verifier for one token kind
///
/// Holds the secret and TTL for a single [`TokenKind`]; the application
/// layer keeps one codec per kind.
#[derive(Clone)]
pub struct TokenCodec {
    kind: TokenKind,
    secret: [u8; 32],
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(kind: TokenKind, secret: [u8; 32], ttl: Duration) -> Self {
        Self { kind, secret, ttl }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a signed token for the given subject and epoch
    pub fn issue(&self, sub: Uuid, epoch: i64) -> String {
        self.issue_at(sub, epoch, Utc::now())
    }

    /// Issue with an explicit clock, so expiry behavior is testable
    pub fn issue_at(&self, sub: Uuid, epoch: i64, now: DateTime<Utc>) -> String {
        let claims = TokenClaims {
            sub,
            epoch,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            kind: self.kind,
        };

        // Claims are a flat struct of primitives; serialization cannot fail.
        let payload = serde_json::to_vec(&claims).expect("token claims serialize");
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(payload_b64.as_bytes());
        let signature = mac.finalize().into_bytes();

        format!("{}.{}", payload_b64, URL_SAFE_NO_PAD.encode(signature))
    }

    /// Verify signature and expiry, returning the embedded claims
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify with an explicit clock
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let (payload_b64, signature_b64) =
            token.split_once('.').ok_or(TokenError::Malformed)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;

        // Signature first: nothing in the payload is trusted until it verifies.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;

        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.kind != self.kind {
            return Err(TokenError::InvalidSignature);
        }

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("kind", &self.kind)
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}
