//! Media Client (C4) and Health Monitor (C5): the control-plane's only
//! collaborator talking to the MediaMTX HTTP API.

pub mod client;
pub mod health;

pub use client::{MediaClient, MediaClientConfig};
pub use health::{CircuitState, HealthMetrics, HealthMonitor, HealthMonitorSettings, HealthRecord, Status};
