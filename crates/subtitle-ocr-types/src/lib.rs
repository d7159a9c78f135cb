//! Shared domain models for the subtitle-ocr workspace.
//!
//! This crate centralizes lightweight data structures used across decoder,
//! vision, engine, and CLI crates. Keep it backend-agnostic and avoid
//! platform-specific dependencies so all crates can depend on it without
//! pulling native SDKs or heavy features.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub type FrameResult<T> = Result<T, FrameError>;

const RGB_CHANNELS: usize = 3;

/// Decoded video frame with packed 8-bit RGB pixels.
#[derive(Clone)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    stride: usize,
    frame_index: Option<u64>,
    timestamp: Option<Duration>,
    data: Arc<[u8]>,
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.data.len())
            .field("frame_index", &self.frame_index)
            .finish()
    }
}

impl VideoFrame {
    pub fn from_rgb_owned(
        width: u32,
        height: u32,
        stride: usize,
        timestamp: Option<Duration>,
        data: Vec<u8>,
    ) -> FrameResult<Self> {
        let row_bytes = (width as usize)
            .checked_mul(RGB_CHANNELS)
            .ok_or_else(|| FrameError::InvalidFrame {
                reason: "calculated RGB row length overflowed".into(),
            })?;
        if stride < row_bytes {
            return Err(FrameError::InvalidFrame {
                reason: format!("stride {stride} is smaller than row length {row_bytes}"),
            });
        }
        let required =
            stride
                .checked_mul(height as usize)
                .ok_or_else(|| FrameError::InvalidFrame {
                    reason: "calculated RGB plane length overflowed".into(),
                })?;
        if data.len() < required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "insufficient RGB bytes: got {} expected at least {}",
                    data.len(),
                    required
                ),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            timestamp,
            data: Arc::from(data.into_boxed_slice()),
            frame_index: None,
        })
    }

    /// Builds a frame where every pixel has the same gray level.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        let stride = width as usize * RGB_CHANNELS;
        Self {
            width,
            height,
            stride,
            timestamp: None,
            data: Arc::from(vec![value; stride * height as usize].into_boxed_slice()),
            frame_index: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the `(r, g, b)` triple at the given pixel, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride + x as usize * RGB_CHANNELS;
        Some((
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ))
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.frame_index
    }

    pub fn with_frame_index(mut self, index: Option<u64>) -> Self {
        self.frame_index = index;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<Duration>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },
}

/// Pixel rectangle in full-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubtitleRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SubtitleRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersects the region with a `frame_width` x `frame_height` canvas.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Self> {
        let left = self.x.min(frame_width);
        let top = self.y.min(frame_height);
        let right = self.x.saturating_add(self.width).min(frame_width);
        let bottom = self.y.saturating_add(self.height).min(frame_height);
        let clamped = Self::new(left, top, right - left, bottom - top);
        if clamped.is_empty() {
            None
        } else {
            Some(clamped)
        }
    }
}

impl fmt::Display for SubtitleRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// One timed subtitle cue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl Segment {
    pub fn new(start: Duration, end: Duration, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl OcrRegion {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrText {
    pub region: OcrRegion,
    pub text: String,
    pub confidence: Option<f32>,
}

impl OcrText {
    pub fn new(region: OcrRegion, text: String) -> Self {
        Self {
            region,
            text,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, value: f32) -> Self {
        self.confidence = Some(value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct OcrResponse {
    pub texts: Vec<OcrText>,
}

impl OcrResponse {
    pub fn new(texts: Vec<OcrText>) -> Self {
        Self { texts }
    }

    pub fn empty() -> Self {
        Self { texts: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_frame_rejects_short_buffers() {
        let err = VideoFrame::from_rgb_owned(4, 2, 12, None, vec![0; 10]).unwrap_err();
        assert!(err.to_string().contains("insufficient RGB bytes"));
    }

    #[test]
    fn rgb_frame_rejects_narrow_stride() {
        assert!(VideoFrame::from_rgb_owned(4, 2, 8, None, vec![0; 64]).is_err());
    }

    #[test]
    fn pixel_reads_respect_stride() {
        let mut data = vec![0u8; 16 * 2];
        data[16] = 10;
        data[17] = 20;
        data[18] = 30;
        let frame = VideoFrame::from_rgb_owned(4, 2, 16, None, data).unwrap();
        assert_eq!(frame.pixel(0, 1), Some((10, 20, 30)));
        assert_eq!(frame.pixel(4, 0), None);
    }

    #[test]
    fn region_clamps_to_canvas() {
        let region = SubtitleRegion::new(90, 40, 50, 50);
        assert_eq!(
            region.clamp_to(100, 60),
            Some(SubtitleRegion::new(90, 40, 10, 20))
        );
        assert_eq!(SubtitleRegion::new(120, 0, 5, 5).clamp_to(100, 60), None);
    }
}
