//! Snapshot capture (C8): tiered still-image capture with cleanup.

pub mod coordinator;
pub mod types;

pub use coordinator::{SnapshotCoordinator, SnapshotSettings};
pub use types::{Snapshot, SnapshotOptions, Tier, UserExperience};
