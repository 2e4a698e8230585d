//! Jack selection from the object catalog.

use bowls_core::{DetectedObject, DetectionConfig, Hsv, ObjectCatalog};
use serde::{Deserialize, Serialize};

/// Shape and size gates for jack candidates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JackSelectorParams {
    pub max_aspect_ratio: f64,
    pub min_radius_px: f64,
    pub max_radius_px: f64,
    /// Aspect ratios within this band of the roundest candidate are
    /// considered equally round; the smaller one wins.
    pub tie_tolerance: f64,
}

impl Default for JackSelectorParams {
    fn default() -> Self {
        Self {
            max_aspect_ratio: 1.8,
            min_radius_px: 15.0,
            max_radius_px: 150.0,
            tie_tolerance: 0.1,
        }
    }
}

impl JackSelectorParams {
    /// Defaults with the aspect-ratio gate taken from the detection config.
    pub fn from_detection_config(cfg: &DetectionConfig) -> Self {
        Self {
            max_aspect_ratio: cfg.max_aspect_ratio,
            ..Self::default()
        }
    }

    fn accepts(&self, obj: &DetectedObject) -> bool {
        let r = obj.radius();
        obj.aspect_ratio() <= self.max_aspect_ratio
            && r >= self.min_radius_px
            && r <= self.max_radius_px
    }
}

/// The jack of one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Jack {
    pub object: DetectedObject,
    /// Catalog index, `None` for a jack synthesized from a manual position.
    pub index: Option<usize>,
}

impl Jack {
    pub fn from_catalog(catalog: &ObjectCatalog, index: usize) -> Option<Self> {
        catalog.get(index).map(|object| Self {
            object: *object,
            index: Some(index),
        })
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.object.radius()
    }
}

/// Pick the jack: the roundest plausible object, preferring the smaller one
/// when several are about equally round.
///
/// Returns the catalog index, or `None` when nothing passes the gates.
pub fn select_jack(catalog: &ObjectCatalog, params: &JackSelectorParams) -> Option<usize> {
    let survivors: Vec<(usize, &DetectedObject)> = catalog
        .iter()
        .enumerate()
        .filter(|(_, o)| params.accepts(o))
        .collect();

    let best_ratio = survivors
        .iter()
        .map(|(_, o)| o.aspect_ratio())
        .min_by(f64::total_cmp)?;
    let tier = best_ratio + params.tie_tolerance;

    let picked = survivors
        .iter()
        .filter(|(_, o)| o.aspect_ratio() <= tier)
        .min_by(|(ia, a), (ib, b)| {
            a.radius()
                .total_cmp(&b.radius())
                .then(a.aspect_ratio().total_cmp(&b.aspect_ratio()))
                .then(ia.cmp(ib))
        })
        .map(|(i, _)| *i);

    if let Some(i) = picked {
        log::debug!(
            "jack #{i} of {} candidates ({} passed gates)",
            catalog.len(),
            survivors.len()
        );
    }
    picked
}

/// Resolve a user-supplied jack position.
///
/// Snaps to the nearest object when the point lies within twice its radius,
/// otherwise places a circular jack at the point sized like the smallest
/// object in the frame.
pub fn select_manual_jack(
    catalog: &ObjectCatalog,
    x: f64,
    y: f64,
    params: &JackSelectorParams,
) -> Jack {
    let probe = nalgebra::Point2::new(x, y);
    let nearest = catalog
        .iter()
        .enumerate()
        .map(|(i, o)| (i, nalgebra::distance(&probe, &o.center()), o))
        .min_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((i, d, o)) = nearest {
        if d <= 2.0 * o.radius() {
            return Jack {
                object: *o,
                index: Some(i),
            };
        }
    }

    let radius = catalog
        .iter()
        .map(DetectedObject::radius)
        .min_by(f64::total_cmp)
        .unwrap_or(params.min_radius_px);
    log::debug!("manual jack at ({x:.1}, {y:.1}) does not hit an object, radius {radius:.1}");
    Jack {
        object: DetectedObject::circle(x, y, radius, Hsv::new(0.0, 0.0, 255.0)),
        index: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ellipse(x: f64, y: f64, radius: f64, ratio: f64) -> DetectedObject {
        // semi-axes with the requested mean radius and ratio
        let minor = 2.0 * radius / (1.0 + ratio);
        DetectedObject {
            major_axis: minor * ratio,
            minor_axis: minor,
            ..DetectedObject::circle(x, y, radius, Hsv::new(0.0, 0.0, 0.0))
        }
    }

    fn catalog(objs: Vec<DetectedObject>) -> ObjectCatalog {
        ObjectCatalog::new(1000, 1000, objs)
    }

    #[test]
    fn prefers_small_round_candidate_in_the_tie_band() {
        let ratios = [1.05, 1.4, 1.9, 1.1];
        let radii = [18.0, 40.0, 22.0, 95.0];
        let objs = ratios
            .iter()
            .zip(radii)
            .enumerate()
            .map(|(i, (&q, r))| ellipse(100.0 * i as f64, 50.0, r, q))
            .collect();
        let cat = catalog(objs);

        let idx = select_jack(&cat, &JackSelectorParams::default()).expect("jack");
        assert_eq!(idx, 0);
        assert!((cat.objects[idx].radius() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn outside_the_tie_band_lowest_ratio_wins() {
        let cat = catalog(vec![
            ellipse(0.0, 0.0, 20.0, 1.5),
            ellipse(100.0, 0.0, 60.0, 1.02),
        ]);
        assert_eq!(select_jack(&cat, &JackSelectorParams::default()), Some(1));
    }

    #[test]
    fn size_gates_and_empty_catalog() {
        let params = JackSelectorParams::default();
        assert_eq!(select_jack(&ObjectCatalog::default(), &params), None);

        let cat = catalog(vec![ellipse(0.0, 0.0, 10.0, 1.0), ellipse(0.0, 0.0, 200.0, 1.0)]);
        assert_eq!(select_jack(&cat, &params), None);
    }

    #[test]
    fn equal_candidates_resolve_by_catalog_order() {
        let cat = catalog(vec![
            ellipse(0.0, 0.0, 20.0, 1.0),
            ellipse(100.0, 0.0, 20.0, 1.0),
        ]);
        assert_eq!(select_jack(&cat, &JackSelectorParams::default()), Some(0));
    }

    #[test]
    fn manual_position_snaps_or_synthesizes() {
        let params = JackSelectorParams::default();
        let cat = catalog(vec![
            ellipse(100.0, 100.0, 30.0, 1.0),
            ellipse(400.0, 100.0, 20.0, 1.0),
        ]);

        let snapped = select_manual_jack(&cat, 120.0, 130.0, &params);
        assert_eq!(snapped.index, Some(0));

        let synthetic = select_manual_jack(&cat, 250.0, 400.0, &params);
        assert_eq!(synthetic.index, None);
        assert_eq!(synthetic.object.center_x, 250.0);
        assert!((synthetic.radius() - 20.0).abs() < 1e-9);

        let lonely = select_manual_jack(&ObjectCatalog::default(), 5.0, 5.0, &params);
        assert_eq!(lonely.radius(), params.min_radius_px);
    }

    #[test]
    fn params_follow_detection_config() {
        let cfg = DetectionConfig {
            max_aspect_ratio: 1.3,
            ..DetectionConfig::default()
        };
        assert_eq!(JackSelectorParams::from_detection_config(&cfg).max_aspect_ratio, 1.3);
    }
}
