//! Domain Layer
//!
//! Contains entities, value objects, repository and delivery traits.

pub mod delivery;
pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{otp_code::OtpCode, user::User};
pub use repository::{ContentRepository, OtpRepository, UserRepository};
