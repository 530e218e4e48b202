//! Multi-factor authentication: TOTP and one-time email codes.

pub mod email_code;
pub mod totp;
pub mod verifier;

pub use email_code::EmailCodes;
pub use totp::TotpEngine;
pub use verifier::{MfaSetup, MfaVerifier};
