//! In-memory store provider.

pub mod store;

pub use store::MemoryRevocationStore;
