//! One-Time Code Delivery Trait
//!
//! Side channel the plaintext code leaves through. Delivery failure
//! never rolls back code creation; the engine logs and moves on so a
//! flaky channel cannot be used to probe code state.

use thiserror::Error;

use crate::domain::value_object::email::Email;

/// Delivery channel failures
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery channel unavailable: {0}")]
    Unavailable(String),
}

/// Outbound delivery of one-time codes
#[trait_variant::make(OtpDelivery: Send)]
pub trait LocalOtpDelivery {
    /// Send the plaintext code to the user's address
    async fn send_code(&self, recipient: &Email, code: &str) -> Result<(), DeliveryError>;
}
