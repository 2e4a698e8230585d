//! Full-image fiducial detection: quad proposal followed by decoding.

use std::collections::HashMap;

use bowls_core::GrayImageView;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::builtins::builtin_dictionary;
use crate::decode::{DecodeConfig, QuadDecoder};
use crate::quad::{propose_quads, QuadParams};
use crate::{Dictionary, Matcher};

/// Parameters for [`detect_fiducials`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiducialParams {
    /// Name of a built-in dictionary.
    pub dictionary: String,
    /// Bit errors tolerated when matching (clamped to the dictionary).
    pub max_hamming: u8,
    pub quads: QuadParams,
    pub decode: DecodeConfig,
}

impl Default for FiducialParams {
    fn default() -> Self {
        Self {
            dictionary: "DICT_4X4_50".to_string(),
            max_hamming: 1,
            quads: QuadParams::default(),
            decode: DecodeConfig::default(),
        }
    }
}

impl FiducialParams {
    pub fn resolve_dictionary(&self) -> Option<Dictionary> {
        builtin_dictionary(&self.dictionary)
    }
}

/// One decoded fiducial in image pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiducialDetection {
    pub id: u32,
    /// Outer corners as found in the image: TL, TR, BR, BL.
    pub corners: [Point2<f64>; 4],
    /// Projective center (intersection of the diagonals).
    pub center: Point2<f64>,
    pub rotation: u8,
    pub hamming: u8,
    pub score: f32,
    pub border_score: f32,
    /// Observed inner bits (row-major, black=1).
    pub code: u64,
    pub inverted: bool,
}

impl FiducialDetection {
    /// Whether `p` lies inside the marker outline (boundary included).
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        let mut sign = 0.0f64;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
            if cross == 0.0 {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }
}

/// Intersection of the quad diagonals; falls back to the corner mean when
/// they are parallel.
pub(crate) fn quad_center(c: &[Point2<f64>; 4]) -> Point2<f64> {
    let (p, r) = (c[0], c[2] - c[0]);
    let (q, s) = (c[1], c[3] - c[1]);
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < 1e-12 {
        let sum = c.iter().fold(nalgebra::Vector2::zeros(), |acc, v| acc + v.coords);
        return Point2::from(sum / 4.0);
    }
    let qp = q - p;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    p + r * t
}

/// Detect and decode fiducials anywhere in `img`.
///
/// At most one detection per id is returned (the best scoring one), sorted
/// by id. Markers rotated close to 45 degrees in the image are not proposed
/// by the extreme-point quad finder.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(w = img.width(), h = img.height()))
)]
pub fn detect_fiducials(img: &image::GrayImage, params: &FiducialParams) -> Vec<FiducialDetection> {
    let Some(dict) = params.resolve_dictionary() else {
        log::warn!("unknown fiducial dictionary {}", params.dictionary);
        return Vec::new();
    };
    let (w, h) = img.dimensions();
    let Some(view) = GrayImageView::new(w as usize, h as usize, img.as_raw()) else {
        return Vec::new();
    };

    let matcher = Matcher::new(dict, params.max_hamming);
    let Some(mut decoder) = QuadDecoder::new(&params.decode, &matcher) else {
        log::warn!("fiducial decode config is unusable: {:?}", params.decode);
        return Vec::new();
    };

    let quads = propose_quads(img, &params.quads);
    log::debug!("{} quad candidates", quads.len());

    let mut best: HashMap<u32, FiducialDetection> = HashMap::new();
    for quad in &quads {
        let Some(d) = decoder.decode(&view, &quad.corners) else {
            continue;
        };
        let det = FiducialDetection {
            id: d.matched.id,
            corners: quad.corners,
            center: quad_center(&quad.corners),
            rotation: d.matched.rotation,
            hamming: d.matched.hamming,
            score: d.score,
            border_score: d.observation.border_score,
            code: d.observation.code,
            inverted: d.observation.inverted,
        };
        match best.get(&det.id) {
            Some(prev) if prev.score >= det.score => {}
            _ => {
                best.insert(det.id, det);
            }
        }
    }

    let mut out: Vec<FiducialDetection> = best.into_values().collect();
    out.sort_by_key(|d| d.id);
    log::debug!("decoded fiducials: {:?}", out.iter().map(|d| d.id).collect::<Vec<_>>());
    out
}
