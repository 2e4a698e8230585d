//! Pixel geometry to physical distance.

use bowls_core::DetectedObject;

use crate::{CorrectedMeasurement, PerspectiveCorrection};

/// Regulation jack diameter.
pub const DEFAULT_JACK_DIAMETER_MM: f64 = 63.5;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DistanceError {
    #[error("invalid scale: jack diameter {diameter_mm} mm, jack radius {radius_px} px")]
    InvalidScale { diameter_mm: f64, radius_px: f64 },
    #[error("bowl {id} cannot be mapped through the perspective correction")]
    UndefinedTransform { id: u32 },
}

/// Round to one decimal place.
#[inline]
pub fn round_to_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Clone, Debug)]
enum Scale {
    /// Fast mode: jack-diameter pixel scale, edge-to-edge gaps.
    PixelsPerMm(f64),
    /// Accurate mode: center-to-center distance on the mat plane.
    Plane(PerspectiveCorrection),
}

/// Distance from the jack, in centimeters, rounded to a tenth.
#[derive(Clone, Debug)]
pub struct DistanceCalculator {
    scale: Scale,
}

impl DistanceCalculator {
    pub fn fast(jack: &DetectedObject, jack_diameter_mm: f64) -> Result<Self, DistanceError> {
        let radius_px = jack.radius();
        let invalid = DistanceError::InvalidScale {
            diameter_mm: jack_diameter_mm,
            radius_px,
        };
        if !(jack_diameter_mm.is_finite() && jack_diameter_mm > 0.0) {
            return Err(invalid);
        }
        let ppmm = 2.0 * radius_px / jack_diameter_mm;
        if !(ppmm.is_finite() && ppmm > 0.0) {
            return Err(invalid);
        }
        Ok(Self {
            scale: Scale::PixelsPerMm(ppmm),
        })
    }

    pub fn accurate(correction: PerspectiveCorrection) -> Self {
        Self {
            scale: Scale::Plane(correction),
        }
    }

    pub fn is_accurate(&self) -> bool {
        matches!(self.scale, Scale::Plane(_))
    }

    /// Fast-mode scale, if any.
    pub fn pixels_per_mm(&self) -> Option<f64> {
        match self.scale {
            Scale::PixelsPerMm(s) => Some(s),
            Scale::Plane(_) => None,
        }
    }

    /// Unrounded distance in centimeters; `None` when a center cannot be mapped.
    pub fn raw_distance_cm(&self, jack: &DetectedObject, obj: &DetectedObject) -> Option<f64> {
        match &self.scale {
            Scale::PixelsPerMm(ppmm) => {
                let edge = (obj.center_distance(jack) - jack.radius() - obj.radius()).max(0.0);
                Some(edge / ppmm / 10.0)
            }
            Scale::Plane(correction) => {
                let (jx, jy) = correction.transform_point(jack.center_x, jack.center_y)?;
                let (ox, oy) = correction.transform_point(obj.center_x, obj.center_y)?;
                Some((ox - jx).hypot(oy - jy) / 10.0)
            }
        }
    }

    /// Distance in centimeters rounded to one decimal.
    pub fn distance_cm(
        &self,
        id: u32,
        jack: &DetectedObject,
        obj: &DetectedObject,
    ) -> Result<f64, DistanceError> {
        self.raw_distance_cm(jack, obj)
            .map(round_to_tenth)
            .ok_or(DistanceError::UndefinedTransform { id })
    }

    /// Corrected measurement of one labelled bowl.
    pub fn measure(
        &self,
        id: u32,
        color: &str,
        jack: &DetectedObject,
        obj: &DetectedObject,
    ) -> Result<CorrectedMeasurement, DistanceError> {
        Ok(CorrectedMeasurement {
            id,
            color: color.to_string(),
            distance_cm: self.distance_cm(id, jack, obj)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bowls_core::{Homography, Hsv};

    fn disc(x: f64, y: f64, r: f64) -> DetectedObject {
        DetectedObject::circle(x, y, r, Hsv::new(0.0, 0.0, 0.0))
    }

    #[test]
    fn jack_scale_edge_distance() {
        // jack r=20 px at 63.5 mm: 0.63 px/mm; 100 px edge gap
        let jack = disc(0.0, 0.0, 20.0);
        let bowl = disc(150.0, 0.0, 30.0);
        let calc = DistanceCalculator::fast(&jack, 63.5).expect("scale");
        assert!((calc.pixels_per_mm().unwrap_or(0.0) - 0.6299).abs() < 1e-3);
        assert_eq!(calc.distance_cm(1, &jack, &bowl).expect("distance"), 15.9);
    }

    #[test]
    fn overlapping_objects_are_at_zero() {
        let jack = disc(0.0, 0.0, 20.0);
        let bowl = disc(30.0, 0.0, 30.0);
        let calc = DistanceCalculator::fast(&jack, DEFAULT_JACK_DIAMETER_MM).expect("scale");
        assert_eq!(calc.distance_cm(1, &jack, &bowl).expect("distance"), 0.0);
    }

    #[test]
    fn invalid_diameters_are_rejected() {
        let jack = disc(0.0, 0.0, 20.0);
        for d in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                DistanceCalculator::fast(&jack, d),
                Err(DistanceError::InvalidScale { .. })
            ));
        }
        assert!(DistanceCalculator::fast(&disc(0.0, 0.0, 0.0), 63.5).is_err());
    }

    #[test]
    fn plane_distance_ignores_radii() {
        // 2 mm per pixel
        let h = Homography::from_array([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]]);
        let calc = DistanceCalculator::accurate(PerspectiveCorrection::new(h));
        assert!(calc.is_accurate());
        let jack = disc(0.0, 0.0, 20.0);
        let bowl = disc(30.0, 40.0, 30.0);
        // 50 px * 2 mm = 100 mm
        let m = calc.measure(4, "Red", &jack, &bowl).expect("distance");
        assert_eq!(
            m,
            CorrectedMeasurement {
                id: 4,
                color: "Red".into(),
                distance_cm: 10.0
            }
        );
    }

    #[test]
    fn unmappable_bowl_is_reported() {
        let h = Homography::from_array([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, -10.0]]);
        let calc = DistanceCalculator::accurate(PerspectiveCorrection::new(h));
        let jack = disc(0.0, 0.0, 5.0);
        let bowl = disc(10.0, 5.0, 5.0);
        assert_eq!(
            calc.distance_cm(9, &jack, &bowl),
            Err(DistanceError::UndefinedTransform { id: 9 })
        );
    }

    #[test]
    fn rounding_is_to_one_decimal() {
        assert_eq!(round_to_tenth(15.873), 15.9);
        assert_eq!(round_to_tenth(0.04), 0.0);
        assert_eq!(round_to_tenth(2.25), 2.3);
    }
}
