//! Core traits defined in `cloudbox-core` and implemented by other crates.

pub mod notifier;
pub mod store;

pub use notifier::{CodePurpose, CodeSender};
pub use store::{CompareAndSwapOutcome, RevocationStore, WindowCount};
