//! # cloudbox-cache
//!
//! [`RevocationStore`](cloudbox_core::traits::RevocationStore) providers for
//! Cloudbox. Supports two modes:
//!
//! - **memory**: in-process store on a [dashmap](https://crates.io/crates/dashmap),
//!   with TTLs measured against the injected clock
//! - **redis**: Redis-backed store using the [redis](https://crates.io/crates/redis)
//!   crate, with Lua scripts for the multi-step atomic operations
//!
//! The provider is selected at runtime based on configuration.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::StoreManager;
