//! Application Layer
//!
//! Use cases and application services.

pub mod authenticate;
pub mod change_email;
pub mod change_password;
pub mod config;
pub mod delete_account;
pub mod moderation;
pub mod otp;
pub mod refresh_session;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub mod step_up;

// Re-exports
pub use authenticate::AuthenticateUseCase;
pub use change_email::ChangeEmailUseCase;
pub use change_password::ChangePasswordUseCase;
pub use config::AuthConfig;
pub use delete_account::{DeleteAccountUseCase, TeardownSummary};
pub use moderation::{BanInput, ModerationUseCase};
pub use otp::OtpEngine;
pub use refresh_session::{RefreshOutput, RefreshSessionUseCase};
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};
pub use step_up::{StepUpInput, StepUpPass, StepUpUseCase};
