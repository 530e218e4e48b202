//! Multi-factor enrollment entities.

pub mod enrollment;

pub use enrollment::MfaEnrollment;
