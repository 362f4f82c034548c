//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256, random codes, Base64)
//! - Password hashing (Argon2id, NIST SP 800-63B compliant)
//! - Stateless bearer token codec (HMAC-SHA256 signed)
//! - Cookie management

pub mod cookie;
pub mod crypto;
pub mod password;
pub mod token;
