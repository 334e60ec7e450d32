//! Device discovery: pure capability parsing (C2) plus the live device set
//! and its polling state machine (C3).

pub mod monitor;
pub mod probe;
pub mod types;
pub mod v4l2_ctl;

pub use monitor::{DeviceMonitor, MonitorSettings};
pub use probe::{probe_device, DeviceCommandExecutor, ProbeCommand};
pub use types::{CapabilityRecord, Device, DeviceEvent, DeviceStatus, FormatRecord};
pub use v4l2_ctl::V4l2CtlExecutor;
