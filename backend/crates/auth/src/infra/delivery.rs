//! One-Time Code Delivery Implementations
//!
//! The default channel writes a delivery notice to the log without the
//! code itself. Deployments wire a real mail or SMS sender behind the
//! same trait.

use crate::domain::delivery::{DeliveryError, OtpDelivery};
use crate::domain::value_object::email::Email;

/// Log-only delivery channel
///
/// Records that a code went out, never the plaintext. Useful as the
/// default in development and as a safe fallback in tests.
#[derive(Debug, Clone, Default)]
pub struct TracingOtpDelivery;

impl OtpDelivery for TracingOtpDelivery {
    async fn send_code(&self, recipient: &Email, code: &str) -> Result<(), DeliveryError> {
        tracing::info!(
            recipient = %recipient,
            code_len = code.len(),
            "One-time code dispatched"
        );
        Ok(())
    }
}
