//! Fixed-window rate limiting over the revocation store.

pub mod limiter;
pub mod scope;

pub use limiter::{RateDecision, RateLimiter};
pub use scope::RateScope;
