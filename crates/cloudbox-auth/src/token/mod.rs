//! Token issuance, validation, rotation and revocation.

pub mod family;
pub mod issuer;
pub mod revocation;
pub mod rotation;
pub mod validator;

pub use family::FamilyState;
pub use issuer::{IssuedToken, TokenIssuer, TokenPair};
pub use revocation::Revocations;
pub use rotation::RotationTracker;
pub use validator::{DenialReason, TokenValidator, ValidatedToken, Verdict};
