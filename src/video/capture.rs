//! Single-shot V4L2 frame grab, used only by the Snapshot Coordinator's
//! Tier 1 (USB Direct) path. The teacher's continuous-streaming
//! `VideoCapturer` is removed: nothing in this crate streams frames through
//! our own process, that is MediaMTX's job.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use v4l::buffer::Type as BufferType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::Format;

use super::format::{PixelFormat, Resolution};
use super::frame::VideoFrame;
use crate::error::{AppError, Result};

const MIN_FRAME_SIZE: usize = 128;

/// Grabs one still frame from a local V4L2 device.
pub struct FrameGrabber {
    device_path: PathBuf,
}

impl FrameGrabber {
    pub fn new(device_path: impl AsRef<Path>) -> Self {
        Self {
            device_path: device_path.as_ref().to_path_buf(),
        }
    }

    pub async fn grab(&self, resolution: Resolution, format: PixelFormat) -> Result<VideoFrame> {
        let device_path = self.device_path.clone();
        tokio::task::spawn_blocking(move || grab_single_frame(&device_path, resolution, format))
            .await
            .map_err(|e| AppError::Device(format!("grab task failed: {e}")))?
    }
}

fn grab_single_frame(device_path: &Path, resolution: Resolution, format: PixelFormat) -> Result<VideoFrame> {
    let device = Device::with_path(device_path)
        .map_err(|e| AppError::Device(format!("failed to open device: {e}")))?;

    let fmt = Format::new(resolution.width, resolution.height, format.to_fourcc());
    let actual = device
        .set_format(&fmt)
        .map_err(|e| AppError::Device(format!("failed to set format: {e}")))?;

    let mut stream = MmapStream::with_buffers(&device, BufferType::VideoCapture, 2)
        .map_err(|e| AppError::Device(format!("failed to create stream: {e}")))?;

    for attempt in 0..5 {
        match stream.next() {
            Ok((buf, _meta)) => {
                if buf.len() >= MIN_FRAME_SIZE {
                    let actual_format = PixelFormat::from_fourcc(actual.fourcc).unwrap_or(format);
                    return Ok(VideoFrame::new(
                        Bytes::copy_from_slice(buf),
                        Resolution::new(actual.width, actual.height),
                        actual_format,
                        actual.stride,
                        0,
                    ));
                }
            }
            Err(e) if attempt == 4 => {
                return Err(AppError::Device(format!("failed to grab frame: {e}")));
            }
            Err(_) => continue,
        }
    }

    Err(AppError::Device("failed to capture a valid frame".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_grabber_stores_the_configured_path() {
        let grabber = FrameGrabber::new("/dev/video0");
        assert_eq!(grabber.device_path, PathBuf::from("/dev/video0"));
    }
}
