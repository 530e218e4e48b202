//! Session flows and component wiring.

pub mod manager;
pub mod services;

pub use manager::{AuthSession, SessionManager, SignupRequest};
pub use services::AuthServices;
