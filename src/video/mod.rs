//! Single-shot local video capture, used only for Snapshot Tier 1 (USB
//! Direct). Device enumeration and continuous streaming are out of scope.

pub mod capture;
pub mod format;
pub mod frame;

pub use capture::FrameGrabber;
pub use format::{PixelFormat, Resolution};
pub use frame::VideoFrame;
