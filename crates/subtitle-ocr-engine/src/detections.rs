//! Helpers shared by detection-style recognizers that produce one result per
//! text line.

use image::GrayImage;

use crate::request::Recognition;
use crate::{OcrRegion, OcrText};

/// Minimum confidence a line must exceed to be kept.
pub const MIN_LINE_CONFIDENCE: f32 = 0.5;

/// Horizontal bands (`start..end` row ranges) that contain ink.
///
/// A row holds ink when any pixel is non-zero. Consecutive ink rows form one
/// band.
pub fn split_lines(image: &GrayImage) -> Vec<(u32, u32)> {
    let (width, height) = image.dimensions();
    let mut bands = Vec::new();
    let mut open: Option<u32> = None;
    for y in 0..height {
        let has_ink = (0..width).any(|x| image.get_pixel(x, y).0[0] != 0);
        match (has_ink, open) {
            (true, None) => open = Some(y),
            (false, Some(start)) => {
                bands.push((start, y));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        bands.push((start, height));
    }
    bands
}

pub fn band_region(image: &GrayImage, band: (u32, u32)) -> OcrRegion {
    OcrRegion::new(
        0.0,
        band.0 as f32,
        image.width() as f32,
        (band.1 - band.0) as f32,
    )
}

/// Joins lines whose confidence exceeds `min_confidence` with single spaces.
///
/// Lines without a confidence score are kept. The combined confidence is the
/// mean over the kept scored lines.
pub fn join_confident(texts: &[OcrText], min_confidence: f32) -> Recognition {
    let mut parts = Vec::new();
    let mut confidence_sum = 0.0f32;
    let mut confidence_count = 0usize;
    for entry in texts {
        if let Some(confidence) = entry.confidence {
            if confidence <= min_confidence {
                continue;
            }
            confidence_sum += confidence;
            confidence_count += 1;
        }
        let text = entry.text.trim();
        if !text.is_empty() {
            parts.push(text);
        }
    }
    let recognition = Recognition::new(parts.join(" "));
    if confidence_count > 0 {
        recognition.with_confidence(confidence_sum / confidence_count as f32)
    } else {
        recognition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn line(text: &str, confidence: f32) -> OcrText {
        OcrText::new(OcrRegion::new(0.0, 0.0, 1.0, 1.0), text.to_string())
            .with_confidence(confidence)
    }

    #[test]
    fn low_confidence_lines_are_dropped() {
        let texts = vec![line("HELLO", 0.9), line("noise", 0.5), line("WORLD", 0.7)];
        let recognition = join_confident(&texts, MIN_LINE_CONFIDENCE);
        assert_eq!(recognition.text, "HELLO WORLD");
        let confidence = recognition.confidence.unwrap();
        assert!((confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn nothing_confident_gives_empty_text() {
        let recognition = join_confident(&[line("x", 0.1)], MIN_LINE_CONFIDENCE);
        assert!(recognition.is_empty());
        assert_eq!(recognition.confidence, None);
    }

    #[test]
    fn bands_follow_ink_rows() {
        let mut image = GrayImage::new(8, 10);
        for y in [1u32, 2, 6, 9] {
            image.put_pixel(3, y, Luma([255]));
        }
        assert_eq!(split_lines(&image), vec![(1, 3), (6, 7), (9, 10)]);
        assert!(split_lines(&GrayImage::new(4, 4)).is_empty());
        let region = band_region(&image, (6, 7));
        assert_eq!(region.y, 6.0);
        assert_eq!(region.height, 1.0);
    }
}
