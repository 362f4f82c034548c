//! Infrastructure Layer
//!
//! Database implementations and external service integrations.

pub mod delivery;
pub mod postgres;

pub use delivery::TracingOtpDelivery;
pub use postgres::PgAuthRepository;
