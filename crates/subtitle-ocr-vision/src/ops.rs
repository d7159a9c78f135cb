use subtitle_ocr_types::{SubtitleRegion, VideoFrame};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// BT.601 luma in 8-bit fixed point.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

/// Grayscale copy of `region`, which must already lie inside the frame.
pub fn crop_gray(frame: &VideoFrame, region: SubtitleRegion) -> Vec<u8> {
    let width = region.width as usize;
    let height = region.height as usize;
    let stride = frame.stride();
    let data = frame.data();
    let mut output = Vec::with_capacity(width * height);
    for row in 0..height {
        let offset = (region.y as usize + row) * stride + region.x as usize * 3;
        let line = &data[offset..offset + width * 3];
        output.extend(line.chunks_exact(3).map(|px| luma(px[0], px[1], px[2])));
    }
    output
}

pub fn histogram(pixels: &[u8]) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &value in pixels {
        hist[value as usize] += 1;
    }
    hist
}

/// Otsu's threshold: the level maximizing between-class variance.
///
/// Returns 0 when no level splits the histogram into two non-empty classes.
pub fn otsu_threshold(pixels: &[u8]) -> u8 {
    let hist = histogram(pixels);
    let total = pixels.len() as f64;
    if total == 0.0 {
        return 0;
    }
    let weighted_sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = 0.0f64;
    let mut background_weight = 0.0f64;
    let mut background_sum = 0.0f64;
    for (level, &count) in hist.iter().enumerate() {
        background_weight += count as f64;
        background_sum += level as f64 * count as f64;
        let foreground_weight = total - background_weight;
        if background_weight == 0.0 || foreground_weight == 0.0 {
            continue;
        }
        let background_mean = background_sum / background_weight;
        let foreground_mean = (weighted_sum - background_sum) / foreground_weight;
        let diff = background_mean - foreground_mean;
        let variance = background_weight * foreground_weight * diff * diff;
        if variance > best_variance {
            best_variance = variance;
            best_threshold = level as u8;
        }
    }
    best_threshold
}

/// Pixels strictly above `threshold` become foreground.
pub fn binarize(pixels: &[u8], threshold: u8) -> Vec<u8> {
    pixels
        .iter()
        .map(|&value| {
            if value > threshold {
                FOREGROUND
            } else {
                BACKGROUND
            }
        })
        .collect()
}

pub fn otsu_binarize(pixels: &[u8]) -> Vec<u8> {
    binarize(pixels, otsu_threshold(pixels))
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `grid` x `grid` tile layout (fewer tiles when a
/// dimension is smaller than `grid`). Each tile gets a clipped, equalized
/// lookup table and pixels blend the four nearest tile tables bilinearly.
pub fn clahe(pixels: &[u8], width: usize, height: usize, clip_limit: f32, grid: usize) -> Vec<u8> {
    assert_eq!(pixels.len(), width * height);
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let tiles_x = grid.clamp(1, width);
    let tiles_y = grid.clamp(1, height);
    let tile_bounds = |tiles: usize, extent: usize, index: usize| {
        (index * extent / tiles, (index + 1) * extent / tiles)
    };

    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        let (y0, y1) = tile_bounds(tiles_y, height, ty);
        for tx in 0..tiles_x {
            let (x0, x1) = tile_bounds(tiles_x, width, tx);
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for &value in &pixels[y * width + x0..y * width + x1] {
                    hist[value as usize] += 1;
                }
            }
            let area = ((x1 - x0) * (y1 - y0)) as u32;
            let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
            clip_histogram(&mut hist, clip);
            let lut = &mut luts[ty * tiles_x + tx];
            let mut cdf = 0u32;
            for (level, &count) in hist.iter().enumerate() {
                cdf += count;
                let mapped = (cdf as f32 * 255.0 / area as f32).round();
                lut[level] = mapped.clamp(0.0, 255.0) as u8;
            }
        }
    }

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;
    let mut output = vec![0u8; pixels.len()];
    for y in 0..height {
        let fy = (y as f32 + 0.5) / tile_h - 0.5;
        let (ty0, ty1, wy) = neighbouring_tiles(fy, tiles_y);
        for x in 0..width {
            let fx = (x as f32 + 0.5) / tile_w - 0.5;
            let (tx0, tx1, wx) = neighbouring_tiles(fx, tiles_x);
            let value = pixels[y * width + x] as usize;
            let top = luts[ty0 * tiles_x + tx0][value] as f32 * (1.0 - wx)
                + luts[ty0 * tiles_x + tx1][value] as f32 * wx;
            let bottom = luts[ty1 * tiles_x + tx0][value] as f32 * (1.0 - wx)
                + luts[ty1 * tiles_x + tx1][value] as f32 * wx;
            let blended = top * (1.0 - wy) + bottom * wy;
            output[y * width + x] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
    output
}

fn clip_histogram(hist: &mut [u32; 256], clip: u32) {
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (level, count) in hist.iter_mut().enumerate() {
        *count += share;
        if level < remainder {
            *count += 1;
        }
    }
}

fn neighbouring_tiles(position: f32, tiles: usize) -> (usize, usize, f32) {
    let last = tiles as isize - 1;
    let base = position.floor();
    let weight = position - base;
    let first = (base as isize).clamp(0, last) as usize;
    let second = (base as isize + 1).clamp(0, last) as usize;
    (first, second, weight)
}

/// 3x3 median filter with replicated borders.
pub fn median_3x3(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    assert_eq!(pixels.len(), width * height);
    let mut output = vec![0u8; pixels.len()];
    let mut window = [0u8; 9];
    for y in 0..height {
        for x in 0..width {
            let mut slot = 0;
            for dy in -1isize..=1 {
                let sy = (y as isize + dy).clamp(0, height as isize - 1) as usize;
                for dx in -1isize..=1 {
                    let sx = (x as isize + dx).clamp(0, width as isize - 1) as usize;
                    window[slot] = pixels[sy * width + sx];
                    slot += 1;
                }
            }
            window.sort_unstable();
            output[y * width + x] = window[4];
        }
    }
    output
}

// 2x2 structuring element anchored at (1, 1): the pixel itself plus its
// left, upper and upper-left neighbours.
const KERNEL_2X2: [(isize, isize); 4] = [(-1, -1), (0, -1), (-1, 0), (0, 0)];

fn morph_2x2(mask: &[u8], width: usize, height: usize, dilate: bool) -> Vec<u8> {
    assert_eq!(mask.len(), width * height);
    let mut output = vec![0u8; mask.len()];
    for y in 0..height {
        for x in 0..width {
            let mut value = if dilate { u8::MIN } else { u8::MAX };
            for (dx, dy) in KERNEL_2X2 {
                let sx = x as isize + dx;
                let sy = y as isize + dy;
                if sx < 0 || sy < 0 {
                    continue;
                }
                let sample = mask[sy as usize * width + sx as usize];
                value = if dilate {
                    value.max(sample)
                } else {
                    value.min(sample)
                };
            }
            output[y * width + x] = value;
        }
    }
    output
}

pub fn dilate_2x2(mask: &[u8], width: usize, height: usize) -> Vec<u8> {
    morph_2x2(mask, width, height, true)
}

pub fn erode_2x2(mask: &[u8], width: usize, height: usize) -> Vec<u8> {
    morph_2x2(mask, width, height, false)
}

/// Morphological closing: dilation followed by erosion.
pub fn close_2x2(mask: &[u8], width: usize, height: usize) -> Vec<u8> {
    let dilated = dilate_2x2(mask, width, height);
    erode_2x2(&dilated, width, height)
}
