use image::GrayImage;
use subtitle_ocr_types::{SubtitleRegion, VideoFrame};
use thiserror::Error;

use crate::ops;

const DEFAULT_CLIP_LIMIT: f32 = 3.0;
const DEFAULT_TILE_GRID: usize = 8;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("region {region} does not intersect the {frame_width}x{frame_height} frame")]
    EmptyRegion {
        region: SubtitleRegion,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("frame has no pixels")]
    EmptyFrame,
    #[error("failed to assemble {width}x{height} image from {len} bytes")]
    Buffer { width: u32, height: u32, len: usize },
}

/// Turns a subtitle crop into a binary image suited for text recognition.
///
/// Pipeline: crop, grayscale, CLAHE, 3x3 median, Otsu binarization, 2x2
/// closing. The output only contains the values 0 and 255.
#[derive(Debug, Clone, Copy)]
pub struct FramePreprocessor {
    clip_limit: f32,
    tile_grid: usize,
}

impl Default for FramePreprocessor {
    fn default() -> Self {
        Self {
            clip_limit: DEFAULT_CLIP_LIMIT,
            tile_grid: DEFAULT_TILE_GRID,
        }
    }
}

impl FramePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes `region` of `frame`, or the whole frame when `region` is `None`.
    pub fn prepare(
        &self,
        frame: &VideoFrame,
        region: Option<SubtitleRegion>,
    ) -> Result<GrayImage, VisionError> {
        let crop = match region {
            Some(region) => {
                region
                    .clamp_to(frame.width(), frame.height())
                    .ok_or(VisionError::EmptyRegion {
                        region,
                        frame_width: frame.width(),
                        frame_height: frame.height(),
                    })?
            }
            None => SubtitleRegion::new(0, 0, frame.width(), frame.height()),
        };
        if crop.is_empty() {
            return Err(VisionError::EmptyFrame);
        }

        let width = crop.width as usize;
        let height = crop.height as usize;
        let gray = ops::crop_gray(frame, crop);
        let equalized = ops::clahe(&gray, width, height, self.clip_limit, self.tile_grid);
        let smoothed = ops::median_3x3(&equalized, width, height);
        let binary = ops::otsu_binarize(&smoothed);
        let closed = ops::close_2x2(&binary, width, height);

        let len = closed.len();
        GrayImage::from_raw(crop.width, crop.height, closed).ok_or(VisionError::Buffer {
            width: crop.width,
            height: crop.height,
            len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_like_frame() -> VideoFrame {
        let width = 320u32;
        let height = 120u32;
        let stride = width as usize * 3;
        let mut data = vec![30u8; stride * height as usize];
        for y in 80..100usize {
            for x in (20..300usize).filter(|x| x % 6 < 4) {
                let offset = y * stride + x * 3;
                data[offset..offset + 3].copy_from_slice(&[230, 230, 220]);
            }
        }
        VideoFrame::from_rgb_owned(width, height, stride, None, data).unwrap()
    }

    #[test]
    fn output_is_strictly_binary_and_sized_to_region() {
        let frame = text_like_frame();
        let region = SubtitleRegion::new(0, 70, 320, 40);
        let image = FramePreprocessor::new()
            .prepare(&frame, Some(region))
            .unwrap();
        assert_eq!(image.dimensions(), (320, 40));
        assert!(image.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert!(image.pixels().any(|p| p.0[0] == 255));
        assert!(image.pixels().any(|p| p.0[0] == 0));
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let frame = text_like_frame();
        let preprocessor = FramePreprocessor::new();
        let first = preprocessor.prepare(&frame, None).unwrap();
        let second = preprocessor.prepare(&frame, None).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn region_is_clamped_to_frame() {
        let frame = text_like_frame();
        let image = FramePreprocessor::new()
            .prepare(&frame, Some(SubtitleRegion::new(300, 110, 50, 50)))
            .unwrap();
        assert_eq!(image.dimensions(), (20, 10));
    }

    #[test]
    fn region_outside_frame_is_rejected() {
        let frame = text_like_frame();
        let err = FramePreprocessor::new()
            .prepare(&frame, Some(SubtitleRegion::new(500, 500, 10, 10)))
            .unwrap_err();
        assert!(matches!(err, VisionError::EmptyRegion { .. }));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let frame = VideoFrame::filled(0, 0, 0);
        let err = FramePreprocessor::new().prepare(&frame, None).unwrap_err();
        assert!(matches!(err, VisionError::EmptyFrame));
    }
}
