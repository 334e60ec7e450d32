//! Storage Guard (C12): free-space enforcement ahead of space-consuming
//! operations.

pub mod guard;

pub use guard::{StorageGuard, StorageStatus};
