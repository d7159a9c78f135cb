//! Border following over binary masks.
//!
//! Blobs are 8-connected groups of non-zero pixels. Each blob's outer border
//! is traced with Moore-neighbour following on an 8-direction chain code,
//! starting from the blob's first pixel in raster order.

use std::collections::VecDeque;

// Chain-code directions in image coordinates (y grows downwards), ordered
// counter-clockwise starting east.
const DIRECTIONS: [(i64, i64); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    points: Vec<(i64, i64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Contour {
    pub fn points(&self) -> &[(i64, i64)] {
        &self.points
    }

    /// Polygon area of the traced border (shoelace formula).
    pub fn area(&self) -> f64 {
        let count = self.points.len();
        if count < 3 {
            return 0.0;
        }
        let mut twice_area = 0i64;
        for (index, &(x0, y0)) in self.points.iter().enumerate() {
            let (x1, y1) = self.points[(index + 1) % count];
            twice_area += x0 * y1 - x1 * y0;
        }
        twice_area.abs() as f64 / 2.0
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut min_x = i64::MAX;
        let mut min_y = i64::MAX;
        let mut max_x = i64::MIN;
        let mut max_y = i64::MIN;
        for &(x, y) in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if self.points.is_empty() {
            return BoundingBox {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            };
        }
        BoundingBox {
            x: min_x as usize,
            y: min_y as usize,
            width: (max_x - min_x + 1) as usize,
            height: (max_y - min_y + 1) as usize,
        }
    }
}

/// Outer borders of every blob, in raster order of each blob's first pixel.
pub fn outer_contours(mask: &[u8], width: usize, height: usize) -> Vec<Contour> {
    assert_eq!(mask.len(), width * height);
    let mut visited = vec![false; mask.len()];
    let mut contours = Vec::new();
    let mut queue = VecDeque::new();
    for start in 0..mask.len() {
        if mask[start] == 0 || visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        while let Some(index) = queue.pop_front() {
            let x = (index % width) as i64;
            let y = (index / width) as i64;
            for (dx, dy) in DIRECTIONS {
                if let Some(next) = offset(width, height, x + dx, y + dy) {
                    if mask[next] != 0 && !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }
        }
        let origin = ((start % width) as i64, (start / width) as i64);
        contours.push(trace_border(mask, width, height, origin));
    }
    contours
}

/// Contour with the greatest area; ties keep the earliest blob.
pub fn largest_contour(contours: &[Contour]) -> Option<&Contour> {
    let mut best: Option<(&Contour, f64)> = None;
    for contour in contours {
        let area = contour.area();
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((contour, area)),
        }
    }
    best.map(|(contour, _)| contour)
}

fn offset(width: usize, height: usize, x: i64, y: i64) -> Option<usize> {
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        None
    } else {
        Some(y as usize * width + x as usize)
    }
}

fn trace_border(mask: &[u8], width: usize, height: usize, origin: (i64, i64)) -> Contour {
    let is_set = |x: i64, y: i64| offset(width, height, x, y).is_some_and(|idx| mask[idx] != 0);
    let mut points = vec![origin];
    let mut current = origin;
    let mut dir = 7usize;
    let max_steps = 4 * width * height + 8;

    for _ in 0..max_steps {
        let first = if dir % 2 == 0 { (dir + 7) % 8 } else { (dir + 6) % 8 };
        let mut advanced = false;
        for step in 0..8 {
            let candidate = (first + step) % 8;
            let (dx, dy) = DIRECTIONS[candidate];
            let next = (current.0 + dx, current.1 + dy);
            if is_set(next.0, next.1) {
                dir = candidate;
                current = next;
                points.push(next);
                advanced = true;
                break;
            }
        }
        if !advanced {
            break;
        }
        let len = points.len();
        if len >= 4 && points[len - 1] == points[1] && points[len - 2] == points[0] {
            points.truncate(len - 2);
            break;
        }
    }
    Contour { points }
}
