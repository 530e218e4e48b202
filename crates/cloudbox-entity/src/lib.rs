//! # cloudbox-entity
//!
//! Domain entity models for Cloudbox accounts. Every struct in this crate
//! represents a database table row or a domain value object. Database
//! entities derive `sqlx::FromRow`.

pub mod mfa;
pub mod user;
