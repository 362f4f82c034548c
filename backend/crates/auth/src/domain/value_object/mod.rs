//! Value Object Module

pub mod ban;
pub mod email;
pub mod user_role;
