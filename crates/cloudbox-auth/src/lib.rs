//! # cloudbox-auth
//!
//! Token lifecycle and request gating for Cloudbox.
//!
//! ## Modules
//!
//! - `jwt`: claim set and the signed-token codec
//! - `token`: issuance, validation, refresh rotation with reuse detection,
//!   and revocation (blacklist, session epoch, family termination)
//! - `rate_limit`: fixed-window limiter over the revocation store
//! - `mfa`: TOTP enrollment/verification and one-time email codes
//! - `gate`: per-request authentication gate
//! - `password`: Argon2id hashing and password policy
//! - `session`: login, signup, refresh, logout, password change and reset flows

pub mod error;
pub mod gate;
pub mod jwt;
pub mod mfa;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod token;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{AuthError, AuthResult};
pub use gate::{AuthenticationGate, Principal, PublicPaths};
pub use jwt::{Claims, TokenCodec, TokenType};
pub use mfa::MfaVerifier;
pub use password::{PasswordHasher, PasswordPolicy};
pub use rate_limit::{RateDecision, RateLimiter, RateScope};
pub use session::{AuthServices, SessionManager};
pub use token::{
    DenialReason, Revocations, RotationTracker, TokenIssuer, TokenPair, TokenValidator, Verdict,
};
