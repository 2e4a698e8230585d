//! Quad proposals: dark, convex, square-ish connected components.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::threshold::otsu_threshold;

/// Geometric gates applied to dark components before decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadParams {
    /// Minimum number of dark pixels in a component.
    pub min_area_px: usize,
    /// Minimum quad side length in pixels.
    pub min_side_px: f64,
    /// Accepted range for `dark pixels / quad area`.
    pub min_fill: f64,
    pub max_fill: f64,
    /// Maximum ratio between the longest and shortest side.
    pub max_side_ratio: f64,
}

impl Default for QuadParams {
    fn default() -> Self {
        Self {
            min_area_px: 100,
            min_side_px: 12.0,
            min_fill: 0.35,
            max_fill: 1.05,
            max_side_ratio: 3.0,
        }
    }
}

/// One candidate marker outline in image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadCandidate {
    /// TL, TR, BR, BL (image orientation, y down).
    pub corners: [Point2<f64>; 4],
    pub area_px: usize,
}

#[derive(Clone, Copy)]
struct Extreme {
    score: i64,
    x: u32,
    y: u32,
}

impl Extreme {
    fn update_min(&mut self, score: i64, x: u32, y: u32) {
        if score < self.score {
            *self = Extreme { score, x, y };
        }
    }

    fn update_max(&mut self, score: i64, x: u32, y: u32) {
        if score > self.score {
            *self = Extreme { score, x, y };
        }
    }
}

#[derive(Clone, Copy)]
struct ComponentStats {
    count: usize,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    tl: Extreme, // min x + y
    br: Extreme, // max x + y
    tr: Extreme, // max x - y
    bl: Extreme, // min x - y
}

impl ComponentStats {
    fn new() -> Self {
        let lo = Extreme {
            score: i64::MIN,
            x: 0,
            y: 0,
        };
        let hi = Extreme {
            score: i64::MAX,
            x: 0,
            y: 0,
        };
        Self {
            count: 0,
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            tl: hi,
            br: lo,
            tr: lo,
            bl: hi,
        }
    }

    fn push(&mut self, x: u32, y: u32) {
        self.count += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        let sum = x as i64 + y as i64;
        let diff = x as i64 - y as i64;
        self.tl.update_min(sum, x, y);
        self.br.update_max(sum, x, y);
        self.tr.update_max(diff, x, y);
        self.bl.update_min(diff, x, y);
    }

    /// Outer pixel corners of the extreme pixels.
    fn corners(&self) -> [Point2<f64>; 4] {
        [
            Point2::new(self.tl.x as f64, self.tl.y as f64),
            Point2::new(self.tr.x as f64 + 1.0, self.tr.y as f64),
            Point2::new(self.br.x as f64 + 1.0, self.br.y as f64 + 1.0),
            Point2::new(self.bl.x as f64, self.bl.y as f64 + 1.0),
        ]
    }
}

/// Signed area of a polygon (shoelace).
pub(crate) fn polygon_area(pts: &[Point2<f64>; 4]) -> f64 {
    let mut acc = 0.0;
    for i in 0..4 {
        let a = pts[i];
        let b = pts[(i + 1) % 4];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

pub(crate) fn is_convex(pts: &[Point2<f64>; 4]) -> bool {
    let mut sign = 0.0f64;
    for i in 0..4 {
        let a = pts[i];
        let b = pts[(i + 1) % 4];
        let c = pts[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross.abs() < 1e-9 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

fn side_lengths(pts: &[Point2<f64>; 4]) -> [f64; 4] {
    [0, 1, 2, 3].map(|i| nalgebra::distance(&pts[i], &pts[(i + 1) % 4]))
}

/// Threshold the image globally (Otsu) and return dark components whose
/// extreme points form a plausible marker quad, largest first.
///
/// Components touching the image border are skipped: their outline is
/// clipped and cannot be decoded reliably.
pub fn propose_quads(img: &GrayImage, params: &QuadParams) -> Vec<QuadCandidate> {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let mut hist = [0u32; 256];
    for p in img.pixels() {
        hist[p[0] as usize] += 1;
    }
    let thr = otsu_threshold(&hist);

    let mask = GrayImage::from_fn(w, h, |x, y| {
        if img.get_pixel(x, y)[0] < thr {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut stats: Vec<ComponentStats> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let l = label[0] as usize;
        if l == 0 {
            continue;
        }
        if stats.len() < l {
            stats.resize(l, ComponentStats::new());
        }
        stats[l - 1].push(x, y);
    }

    let mut out: Vec<QuadCandidate> = stats
        .iter()
        .filter(|s| s.count >= params.min_area_px)
        .filter(|s| s.min_x > 0 && s.min_y > 0 && s.max_x + 1 < w && s.max_y + 1 < h)
        .filter_map(|s| {
            let corners = s.corners();
            if !is_convex(&corners) {
                return None;
            }
            let sides = side_lengths(&corners);
            let min_side = sides.iter().copied().fold(f64::INFINITY, f64::min);
            let max_side = sides.iter().copied().fold(0.0, f64::max);
            if min_side < params.min_side_px || max_side > params.max_side_ratio * min_side {
                return None;
            }
            let fill = s.count as f64 / polygon_area(&corners).abs();
            if fill < params.min_fill || fill > params.max_fill {
                return None;
            }
            Some(QuadCandidate {
                corners,
                area_px: s.count,
            })
        })
        .collect();

    out.sort_by(|a, b| b.area_px.cmp(&a.area_px));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([230u8]))
    }

    fn fill_rect(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, v: u8) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([v]));
            }
        }
    }

    #[test]
    fn dark_square_becomes_quad() {
        let mut img = canvas(120, 100);
        fill_rect(&mut img, 20, 30, 60, 70, 10);

        let quads = propose_quads(&img, &QuadParams::default());
        assert_eq!(quads.len(), 1);
        let q = quads[0];
        assert_eq!(q.corners[0], Point2::new(20.0, 30.0));
        assert_eq!(q.corners[1], Point2::new(60.0, 30.0));
        assert_eq!(q.corners[2], Point2::new(60.0, 70.0));
        assert_eq!(q.corners[3], Point2::new(20.0, 70.0));
        assert_eq!(q.area_px, 1600);
    }

    #[test]
    fn disc_is_rejected_by_fill_ratio() {
        let mut img = canvas(120, 120);
        for y in 0..120u32 {
            for x in 0..120u32 {
                let dx = x as f64 + 0.5 - 60.0;
                let dy = y as f64 + 0.5 - 60.0;
                if dx * dx + dy * dy <= 30.0 * 30.0 {
                    img.put_pixel(x, y, Luma([10]));
                }
            }
        }
        assert!(propose_quads(&img, &QuadParams::default()).is_empty());
    }

    #[test]
    fn border_touching_and_tiny_blobs_are_skipped() {
        let mut img = canvas(100, 100);
        fill_rect(&mut img, 0, 10, 30, 40, 10);
        fill_rect(&mut img, 60, 60, 64, 64, 10);
        assert!(propose_quads(&img, &QuadParams::default()).is_empty());
    }

    #[test]
    fn convexity_and_area_helpers() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert!(is_convex(&square));
        assert_eq!(polygon_area(&square).abs(), 4.0);

        let bowtie = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        ];
        assert!(!is_convex(&bowtie));
    }
}
