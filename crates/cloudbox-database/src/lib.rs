//! # cloudbox-database
//!
//! PostgreSQL connection management and the relational account lookups the
//! session subsystem depends on. The [`UserDirectory`] and [`MfaRepository`]
//! traits live here because they speak entity types; the auth crate only
//! sees them as trait objects.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{MfaRepository, UserDirectory};
