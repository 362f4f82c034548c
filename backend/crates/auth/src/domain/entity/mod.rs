//! Entity Module

pub mod otp_code;
pub mod user;
