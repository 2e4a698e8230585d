//! Perspective correction from four corner fiducials.
//!
//! The markers sit at the corners of a reference rectangle of known size
//! (TL, TR, BR, BL). Their centers give four image-to-millimeter
//! correspondences, enough for an exact homography.

use bowls_core::{homography_from_4pt, DetectedObject, Homography, ObjectCatalog};
use bowls_fiducial::{detect_fiducials, FiducialDetection, FiducialParams};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors of the perspective-correction path. None of them is fatal for a
/// measurement: the caller falls back to jack-scale distances.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MetrologyError {
    #[error("corner markers not found: {missing:?}")]
    MarkersIncomplete { missing: Vec<u32> },
    #[error("corner markers do not define a valid perspective transform")]
    DegenerateHomography,
    #[error("point ({x:.1}, {y:.1}) maps to infinity")]
    UndefinedTransform { x: f64, y: f64 },
}

/// Marker layout of the measuring mat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetrologyParams {
    /// Marker ids at the TL, TR, BR and BL corners.
    pub marker_ids: [u32; 4],
    pub reference_width_mm: f64,
    pub reference_height_mm: f64,
    pub fiducials: FiducialParams,
}

impl Default for MetrologyParams {
    fn default() -> Self {
        Self {
            marker_ids: [0, 1, 2, 3],
            reference_width_mm: 2000.0,
            reference_height_mm: 2000.0,
            fiducials: FiducialParams::default(),
        }
    }
}

impl MetrologyParams {
    /// Rectangle corners in millimeters, in marker-id order.
    pub fn world_corners(&self) -> [Point2<f64>; 4] {
        let (w, h) = (self.reference_width_mm, self.reference_height_mm);
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }
}

/// Image pixels to millimeters on the mat plane.
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCorrection {
    homography: Homography,
    fiducials: Vec<FiducialDetection>,
}

impl PerspectiveCorrection {
    pub fn new(homography: Homography) -> Self {
        Self {
            homography,
            fiducials: Vec::new(),
        }
    }

    /// Solve from four image points and their millimeter positions.
    pub fn from_correspondences(
        image: &[Point2<f64>; 4],
        world: &[Point2<f64>; 4],
    ) -> Result<Self, MetrologyError> {
        if has_collinear_triple(image) || has_collinear_triple(world) {
            return Err(MetrologyError::DegenerateHomography);
        }
        homography_from_4pt(image, world)
            .filter(|h| h.h.determinant().abs() > f64::EPSILON)
            .map(Self::new)
            .ok_or(MetrologyError::DegenerateHomography)
    }

    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Fiducials the correction was solved from (empty when built directly).
    pub fn fiducials(&self) -> &[FiducialDetection] {
        &self.fiducials
    }

    /// Map an image point to millimeters; `None` when it maps to infinity.
    pub fn transform_point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.homography
            .apply(Point2::new(x, y))
            .map(|p| (p.x, p.y))
    }

    /// Drop catalog objects whose center lies on one of the fiducials.
    pub fn remove_fiducial_objects(&self, catalog: &ObjectCatalog) -> ObjectCatalog {
        remove_fiducial_objects(catalog, &self.fiducials)
    }
}

/// Drop catalog objects whose center lies inside any of `fiducials`.
///
/// Printed markers segment like any other blob, so they are removed whether
/// or not they end up in a perspective correction.
pub fn remove_fiducial_objects(
    catalog: &ObjectCatalog,
    fiducials: &[FiducialDetection],
) -> ObjectCatalog {
    let objects: Vec<DetectedObject> = catalog
        .iter()
        .filter(|o| !fiducials.iter().any(|f| f.contains(&o.center())))
        .copied()
        .collect();
    if objects.len() != catalog.len() {
        log::debug!(
            "removed {} catalog objects lying on fiducials",
            catalog.len() - objects.len()
        );
    }
    ObjectCatalog::new(catalog.width, catalog.height, objects)
}

/// Any three of the four points (nearly) on one line.
fn has_collinear_triple(pts: &[Point2<f64>; 4]) -> bool {
    let scale = pts
        .iter()
        .flat_map(|a| pts.iter().map(move |b| nalgebra::distance(a, b)))
        .fold(0.0, f64::max);
    if scale <= 0.0 {
        return true;
    }
    let tol = 1e-9 * scale * scale;
    [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)]
        .iter()
        .any(|&(i, j, k)| {
            let (a, b, c) = (pts[i], pts[j], pts[k]);
            ((b - a).perp(&(c - a))).abs() <= tol
        })
}

/// Finds the corner markers and solves the correction.
#[derive(Clone, Debug, Default)]
pub struct MetrologyCorrector {
    params: MetrologyParams,
}

impl MetrologyCorrector {
    pub fn new(params: MetrologyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MetrologyParams {
        &self.params
    }

    /// Decode every dictionary marker in `gray`, corner ids or not.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, gray)))]
    pub fn detect(&self, gray: &image::GrayImage) -> Vec<FiducialDetection> {
        detect_fiducials(gray, &self.params.fiducials)
    }

    /// Detect fiducials in `gray` and solve the correction.
    pub fn correct(
        &self,
        gray: &image::GrayImage,
    ) -> Result<PerspectiveCorrection, MetrologyError> {
        self.correct_detections(self.detect(gray))
    }

    /// Solve from already decoded fiducials. All four corner ids are required.
    pub fn correct_detections(
        &self,
        detections: Vec<FiducialDetection>,
    ) -> Result<PerspectiveCorrection, MetrologyError> {
        let find = |id: u32| detections.iter().find(|d| d.id == id);

        let missing: Vec<u32> = self
            .params
            .marker_ids
            .iter()
            .copied()
            .filter(|&id| find(id).is_none())
            .collect();
        if !missing.is_empty() {
            log::warn!("perspective correction unavailable, missing markers {missing:?}");
            return Err(MetrologyError::MarkersIncomplete { missing });
        }

        let mut image = [Point2::origin(); 4];
        for (slot, id) in image.iter_mut().zip(self.params.marker_ids) {
            if let Some(d) = find(id) {
                *slot = d.center;
            }
        }

        let mut correction =
            PerspectiveCorrection::from_correspondences(&image, &self.params.world_corners())?;
        correction.fiducials = detections
            .into_iter()
            .filter(|d| self.params.marker_ids.contains(&d.id))
            .collect();
        Ok(correction)
    }
}
