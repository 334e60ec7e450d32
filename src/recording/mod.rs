//! Recording Coordinator (C7): segmented-recording session lifecycle.

pub mod coordinator;
pub mod types;

pub use coordinator::RecordingCoordinator;
pub use types::{RecordingOptions, RecordingSession, SessionState};
