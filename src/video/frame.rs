//! Captured still-frame data, used by the Snapshot Coordinator's Tier 1
//! (USB Direct) path. No continuous-streaming pool/dedup machinery — this
//! spec captures one frame at a time, never a stream.

use bytes::Bytes;
use std::time::Instant;

use super::format::{PixelFormat, Resolution};

/// A single captured frame with metadata.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    data: Bytes,
    pub resolution: Resolution,
    pub format: PixelFormat,
    pub stride: u32,
    pub sequence: u64,
    pub capture_ts: Instant,
}

impl VideoFrame {
    pub fn new(data: Bytes, resolution: Resolution, format: PixelFormat, stride: u32, sequence: u64) -> Self {
        Self {
            data,
            resolution,
            format,
            stride,
            sequence,
            capture_ts: Instant::now(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    pub fn age(&self) -> std::time::Duration {
        self.capture_ts.elapsed()
    }

    pub fn is_jpeg(&self) -> bool {
        self.format.is_compressed()
    }

    pub fn is_valid_jpeg(&self) -> bool {
        self.is_jpeg() && Self::is_valid_jpeg_bytes(self.data())
    }

    pub fn is_valid_jpeg_bytes(data: &[u8]) -> bool {
        if data.len() < 125 {
            return false;
        }
        let start_marker = ((data[0] as u16) << 8) | data[1] as u16;
        if start_marker != 0xFFD8 {
            return false;
        }
        let end = data.len();
        let end_marker = ((data[end - 2] as u16) << 8) | data[end - 1] as u16;
        matches!(end_marker, 0xFFD9 | 0xD900 | 0x0000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_jpeg_bytes_requires_soi_and_eoi_markers() {
        let mut data = vec![0xFF, 0xD8];
        data.extend(vec![0u8; 200]);
        data.extend([0xFF, 0xD9]);
        assert!(VideoFrame::is_valid_jpeg_bytes(&data));
        assert!(!VideoFrame::is_valid_jpeg_bytes(&[0xFF, 0xD8]));
    }
}
