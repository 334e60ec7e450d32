//! Shells out to `v4l2-ctl` to supply the text the Device Probe parses
//! (spec §4.2). The probe stays pure; this is the only piece that touches
//! a process.

use std::path::Path;
use std::process::Command;

use super::probe::{DeviceCommandExecutor, ProbeCommand};

pub struct V4l2CtlExecutor;

impl DeviceCommandExecutor for V4l2CtlExecutor {
    fn exec(&self, path: &Path, command: ProbeCommand) -> Result<String, String> {
        let flag = match command {
            ProbeCommand::Info => "--info",
            ProbeCommand::ListFormatsExt => "--list-formats-ext",
            ProbeCommand::ListFrameIntervals => "--list-frameintervals",
        };
        let output = Command::new("v4l2-ctl")
            .arg("--device")
            .arg(path)
            .arg(flag)
            .output()
            .map_err(|e| format!("failed to execute v4l2-ctl {flag}: {e}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(if stderr.is_empty() {
                format!("v4l2-ctl {flag} exited with {}", output.status)
            } else {
                format!("v4l2-ctl {flag} exited with {}: {stderr}", output.status)
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
