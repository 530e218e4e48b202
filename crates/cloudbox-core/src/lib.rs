//! # cloudbox-core
//!
//! Core crate for Cloudbox. Contains the configuration schemas, the clock
//! abstraction, the unified error system, and the traits describing the
//! entity-free external collaborators of the session subsystem
//! (revocation store and code delivery).
//!
//! This crate has **no** internal dependencies on other Cloudbox crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AppError;
pub use result::AppResult;
