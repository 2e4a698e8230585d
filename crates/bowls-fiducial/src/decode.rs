//! Marker decoding from image-space quads.
//!
//! A candidate quad is mapped onto a canonical square with a homography,
//! the bit grid is sampled at cell centers, thresholded with Otsu over a
//! denser interior grid and matched against the dictionary.

use crate::threshold::otsu_threshold_from_samples;
use crate::{Match, Matcher};
use bowls_core::{homography_from_4pt, GrayImageView, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Decoder configuration for one quad.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Marker border width in cells (OpenCV uses 1).
    pub border_bits: usize,
    /// Fraction of the marker side ignored near its edges.
    pub inset_frac: f32,
    /// Side of the canonical square the quad is mapped onto.
    pub canonical_px: f32,
    /// Require border-black ratio >= this.
    pub min_border_score: f32,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            border_bits: 1,
            inset_frac: 0.04,
            canonical_px: 60.0,
            min_border_score: 0.85,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct MarkerObservation {
    pub code: u64,
    pub border_score: f32,
    pub inverted: bool,
}

/// A decoded quad: observation plus dictionary match.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DecodedQuad {
    pub observation: MarkerObservation,
    pub matched: Match,
    pub score: f32,
}

const MIN_SIDE_PX: f32 = 12.0;
const THRESH_SUBDIV: usize = 3;

struct SampleGrid {
    cells: usize,
    points: Vec<Point2<f32>>, // row-major: cy * cells + cx
    threshold_points: Vec<Point2<f32>>,
}

impl SampleGrid {
    fn new(cfg: &DecodeConfig, bits: usize) -> Option<Self> {
        if bits * bits > 64 {
            return None;
        }
        let cells = bits + 2 * cfg.border_bits;
        let s = cfg.canonical_px;
        if cells == 0 || s <= 1.0 {
            return None;
        }

        let inset = (cfg.inset_frac * s).max(0.0);
        let side = s - 2.0 * inset;
        if side < MIN_SIDE_PX {
            return None;
        }

        let step = side / cells as f32;
        let points = grid_points(inset, step, cells);

        let thr_cells = cells * THRESH_SUBDIV;
        let threshold_points = grid_points(inset, side / thr_cells as f32, thr_cells);

        Some(Self {
            cells,
            points,
            threshold_points,
        })
    }
}

fn grid_points(start: f32, step: f32, n: usize) -> Vec<Point2<f32>> {
    let mut points = Vec::with_capacity(n * n);
    for cy in 0..n {
        for cx in 0..n {
            points.push(Point2::new(
                start + (cx as f32 + 0.5) * step,
                start + (cy as f32 + 0.5) * step,
            ));
        }
    }
    points
}

/// Reusable decoder; keeps scratch buffers across quads of one frame.
pub(crate) struct QuadDecoder<'a> {
    cfg: &'a DecodeConfig,
    matcher: &'a Matcher,
    bits: usize,
    grid: SampleGrid,
    scratch_bits: Vec<u8>,
    scratch_thr: Vec<u8>,
}

impl<'a> QuadDecoder<'a> {
    pub fn new(cfg: &'a DecodeConfig, matcher: &'a Matcher) -> Option<Self> {
        let bits = matcher.dictionary().marker_size;
        let grid = SampleGrid::new(cfg, bits)?;
        Some(Self {
            cfg,
            matcher,
            bits,
            scratch_bits: Vec::with_capacity(grid.points.len()),
            scratch_thr: Vec::with_capacity(grid.threshold_points.len()),
            grid,
        })
    }

    /// Decode the marker inside `corners_img` (TL, TR, BR, BL).
    pub fn decode(
        &mut self,
        img: &GrayImageView<'_>,
        corners_img: &[Point2<f64>; 4],
    ) -> Option<DecodedQuad> {
        let s = self.cfg.canonical_px as f64;
        let canonical = [
            Point2::new(0.0, 0.0),
            Point2::new(s, 0.0),
            Point2::new(s, s),
            Point2::new(0.0, s),
        ];
        let h = homography_from_4pt(&canonical, corners_img)?;
        let observation = self.observe(img, &h)?;

        let matched = self.matcher.match_code(observation.code)?;
        let bits = self.matcher.dictionary().bit_count().max(1) as f32;
        let ham_pen = 1.0 - matched.hamming as f32 / bits;
        let score = (observation.border_score * ham_pen).clamp(0.0, 1.0);

        Some(DecodedQuad {
            observation,
            matched,
            score,
        })
    }

    fn observe(&mut self, img: &GrayImageView<'_>, h: &Homography) -> Option<MarkerObservation> {
        // every bit cell must be readable, threshold samples may fall outside
        self.scratch_bits.clear();
        for p in &self.grid.points {
            self.scratch_bits.push(patch_mean(img, h.apply_f32(*p))?);
        }
        self.scratch_thr.clear();
        self.scratch_thr.extend(
            self.grid
                .threshold_points
                .iter()
                .filter_map(|p| patch_mean(img, h.apply_f32(*p))),
        );

        let layout = CellLayout {
            cells: self.grid.cells,
            bits: self.bits,
            border: self.cfg.border_bits,
        };
        let thr_source = if self.scratch_thr.is_empty() {
            &self.scratch_bits
        } else {
            &self.scratch_thr
        };
        let thr = otsu_threshold_from_samples(thr_source);

        [false, true]
            .into_iter()
            .map(|inverted| layout.read(&self.scratch_bits, thr, inverted))
            .filter(|o| o.border_score >= self.cfg.min_border_score)
            .fold(None, |best: Option<MarkerObservation>, o| match best {
                Some(b) if b.border_score >= o.border_score => Some(b),
                _ => Some(o),
            })
    }
}

/// Cell grid of one marker: `bits x bits` payload inside a black border.
#[derive(Clone, Copy, Debug)]
struct CellLayout {
    cells: usize,
    bits: usize,
    border: usize,
}

impl CellLayout {
    fn is_border(&self, cx: usize, cy: usize) -> bool {
        let b = self.border;
        b > 0 && (cx < b || cy < b || cx + b >= self.cells || cy + b >= self.cells)
    }

    /// Payload code (row-major, black = 1) and fraction of black border cells.
    fn read(&self, samples: &[u8], thr: u8, inverted: bool) -> MarkerObservation {
        let mut code = 0u64;
        let (mut black_border, mut border_cells) = (0u32, 0u32);
        for (i, &v) in samples.iter().enumerate().take(self.cells * self.cells) {
            let (cx, cy) = (i % self.cells, i / self.cells);
            let black = (v < thr) ^ inverted;
            if self.is_border(cx, cy) {
                border_cells += 1;
                black_border += u32::from(black);
            } else if black {
                let bit = (cy - self.border) * self.bits + (cx - self.border);
                code |= 1u64 << bit;
            }
        }
        let border_score = match border_cells {
            0 => 1.0,
            n => black_border as f32 / n as f32,
        };
        MarkerObservation {
            code,
            border_score,
            inverted,
        }
    }
}

/// Mean of the 3x3 pixel patch around `p`; `None` off the image.
fn patch_mean(img: &GrayImageView<'_>, p: Point2<f32>) -> Option<u8> {
    if !(p.x.is_finite() && p.y.is_finite()) {
        return None;
    }
    let (x, y) = (p.x.floor() as i32, p.y.floor() as i32);
    let inside = |v: i32, n: usize| v >= 1 && ((v + 1) as usize) < n;
    if !(inside(x, img.width) && inside(y, img.height)) {
        return None;
    }
    let sum: u32 = (-1..=1)
        .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
        .map(|(dx, dy)| img.get(x + dx, y + dy) as u32)
        .sum();
    Some((sum / 9) as u8)
}
