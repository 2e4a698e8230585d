use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::Hsv;

/// One round/elliptical object found in a frame.
///
/// Axes are semi-axis lengths in pixels (`major_axis >= minor_axis`), so
/// [`DetectedObject::radius`] is the mean radius of the ellipse.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub center_x: f64,
    pub center_y: f64,
    pub major_axis: f64,
    pub minor_axis: f64,
    /// Orientation of the major axis from +x, in degrees.
    pub angle: f64,
    /// Pixel area of the detected region.
    pub area: f64,
    /// Mean color of the region's pixels.
    pub color: Hsv,
}

impl DetectedObject {
    /// A circular object, handy for manual positions and tests.
    pub fn circle(center_x: f64, center_y: f64, radius: f64, color: Hsv) -> Self {
        Self {
            center_x,
            center_y,
            major_axis: radius,
            minor_axis: radius,
            angle: 0.0,
            area: std::f64::consts::PI * radius * radius,
            color,
        }
    }

    /// `major / minor`, never below 1; `1.0` for a zero minor axis.
    #[inline]
    pub fn aspect_ratio(&self) -> f64 {
        if self.minor_axis <= 0.0 {
            return 1.0;
        }
        (self.major_axis / self.minor_axis).max(1.0)
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        (self.major_axis + self.minor_axis) / 2.0
    }

    #[inline]
    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.center_x, self.center_y)
    }

    /// Euclidean center-to-center distance.
    #[inline]
    pub fn center_distance(&self, other: &DetectedObject) -> f64 {
        nalgebra::distance(&self.center(), &other.center())
    }

    /// Copy with center and axes multiplied by `factor` (area by its square).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            center_x: self.center_x * factor,
            center_y: self.center_y * factor,
            major_axis: self.major_axis * factor,
            minor_axis: self.minor_axis * factor,
            area: self.area * factor * factor,
            ..*self
        }
    }
}

/// All objects detected in one frame, in detector order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectCatalog {
    /// Dimensions of the frame the objects were detected on.
    pub width: u32,
    pub height: u32,
    pub objects: Vec<DetectedObject>,
}

impl ObjectCatalog {
    pub fn new(width: u32, height: u32, objects: Vec<DetectedObject>) -> Self {
        Self {
            width,
            height,
            objects,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DetectedObject> {
        self.objects.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DetectedObject> {
        self.objects.iter()
    }

    /// Radii of all objects, in catalog order.
    pub fn radii(&self) -> Vec<f64> {
        self.objects.iter().map(DetectedObject::radius).collect()
    }
}
