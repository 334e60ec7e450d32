//! camera-recorder - control plane for local video-capture devices in
//! front of a MediaMTX media server.
//!
//! Exposes a JSON-RPC 2.0 interface over WebSocket: clients discover and
//! inspect cameras, drive segmented recordings and tiered snapshot capture,
//! and receive real-time event notifications, all behind bearer-token
//! authentication, per-method role checks, and per-client rate limiting.

pub mod auth;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod media;
pub mod paths;
pub mod recording;
pub mod rpc;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod utils;
pub mod video;

pub use error::{AppError, Result};
