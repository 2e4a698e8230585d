//! HSV color handling in the OpenCV 8-bit convention.
//!
//! Hue lives in `[0, 180)` (degrees halved), saturation and value in
//! `[0, 255]`. Stored as `f32` so mean colors of pixel sets stay exact.

use serde::{Deserialize, Serialize};

/// Weight of the value channel in [`hsv_distance`].
const VALUE_WEIGHT: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl Hsv {
    pub const fn new(h: f32, s: f32, v: f32) -> Self {
        Self { h, s, v }
    }

    pub fn from_rgb(rgb: [u8; 3]) -> Self {
        rgb_to_hsv(rgb[0], rgb[1], rgb[2])
    }
}

/// Convert 8-bit RGB to OpenCV-style HSV.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let deg = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max <= f32::EPSILON {
        0.0
    } else {
        delta / max * 255.0
    };

    Hsv {
        h: (deg / 2.0).rem_euclid(180.0),
        s,
        v: max,
    }
}

/// Circular hue distance on the `[0, 180)` wheel, in `[0, 90]`.
#[inline]
pub fn hue_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).abs().rem_euclid(180.0);
    d.min(180.0 - d)
}

/// Normalized distance between two colors.
///
/// Each channel is scaled to `[0, 1]` (hue by its maximal circular distance
/// of 90) and value is down-weighted.
pub fn hsv_distance(a: &Hsv, b: &Hsv) -> f32 {
    let dh = hue_distance(a.h, b.h) / 90.0;
    let ds = (a.s - b.s) / 255.0;
    let dv = VALUE_WEIGHT * (a.v - b.v) / 255.0;
    (dh * dh + ds * ds + dv * dv).sqrt()
}

/// Inclusive per-channel HSV box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn is_ordered(&self) -> bool {
        self.lower.iter().zip(&self.upper).all(|(lo, hi)| lo <= hi)
    }

    pub fn contains(&self, c: &Hsv) -> bool {
        let vals = [c.h, c.s, c.v];
        vals.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(&v, (&lo, &hi))| v >= lo as f32 && v <= hi as f32)
    }
}
