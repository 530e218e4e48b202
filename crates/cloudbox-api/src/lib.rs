//! # cloudbox-api
//!
//! HTTP API layer for Cloudbox built on Axum.
//!
//! Provides the authentication endpoints, middleware (authentication gate,
//! rate limiting, request logging), extractors, DTOs, and error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, serve};
pub use state::AppState;
