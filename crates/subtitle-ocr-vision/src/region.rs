use subtitle_ocr_types::{SubtitleRegion, VideoFrame};

use crate::contour::{largest_contour, outer_contours};
use crate::ops::{crop_gray, otsu_binarize};

// Fraction of the frame height, measured from the bottom, that is searched.
const SEARCH_STRIP_RATIO: f64 = 0.2;
// Margin added around the detected text box on every side.
const PADDING: u32 = 10;

/// Locates the most prominent text-like blob near the bottom of a frame.
///
/// The detector holds no state between calls and can be built wherever a
/// one-off detection is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionDetector;

impl RegionDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, frame: &VideoFrame) -> Option<SubtitleRegion> {
        let width = frame.width();
        let height = frame.height();
        let strip_height = (height as f64 * SEARCH_STRIP_RATIO).floor() as u32;
        if width == 0 || strip_height == 0 {
            return None;
        }
        let strip_top = height - strip_height;
        let strip = SubtitleRegion::new(0, strip_top, width, strip_height);

        let gray = crop_gray(frame, strip);
        let mask = otsu_binarize(&gray);
        let contours = outer_contours(&mask, width as usize, strip_height as usize);
        let bbox = largest_contour(&contours)?.bounding_box();

        let x = (bbox.x as u32).saturating_sub(PADDING);
        let y = (bbox.y as u32).saturating_sub(PADDING);
        let padded_width = (width - x).min(bbox.width as u32 + 2 * PADDING);
        let padded_height = (strip_height - y).min(bbox.height as u32 + 2 * PADDING);
        Some(SubtitleRegion::new(
            x,
            y + strip_top,
            padded_width,
            padded_height,
        ))
    }
}
