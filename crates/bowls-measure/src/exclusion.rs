//! Removal of the jack and of objects overlapping it.

use bowls_core::{DetectedObject, ObjectCatalog};

use crate::Jack;

/// Fraction of the jack radius used as the minimum margin.
pub const MIN_MARGIN_JACK_FRACTION: f64 = 0.15;

/// Population standard deviation; `0.0` for fewer than two values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    var.sqrt()
}

/// Per-frame margin: `max(0.15 * jack_radius, 2 * sigma)` where sigma is the
/// spread of all radii in the frame, jack included.
pub fn exclusion_margin(catalog: &ObjectCatalog, jack: &Jack) -> f64 {
    let mut radii = catalog.radii();
    if jack.index.is_none() {
        radii.push(jack.radius());
    }
    (MIN_MARGIN_JACK_FRACTION * jack.radius()).max(2.0 * std_dev(&radii))
}

/// Objects that are neither the jack nor within
/// `jack_radius + radius + margin` of its center, in catalog order.
pub fn filter_overlapping(catalog: &ObjectCatalog, jack: &Jack) -> Vec<DetectedObject> {
    let margin = exclusion_margin(catalog, jack);
    let kept: Vec<DetectedObject> = catalog
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != jack.index)
        .filter(|(_, o)| {
            o.center_distance(&jack.object) > jack.radius() + o.radius() + margin
        })
        .map(|(_, o)| *o)
        .collect();

    log::debug!(
        "exclusion margin {margin:.2} px, kept {} of {} objects",
        kept.len(),
        catalog.len()
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use bowls_core::Hsv;

    fn disc(x: f64, y: f64, r: f64) -> DetectedObject {
        DetectedObject::circle(x, y, r, Hsv::new(0.0, 0.0, 0.0))
    }

    #[test]
    fn std_dev_is_population() {
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(std_dev(&[3.0]), 0.0);
        assert!((std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn margin_uses_larger_of_both_terms() {
        // identical radii: sigma is zero, jack fraction wins
        let cat = ObjectCatalog::new(100, 100, vec![disc(0.0, 0.0, 20.0), disc(90.0, 0.0, 20.0)]);
        let jack = Jack::from_catalog(&cat, 0).expect("jack");
        assert!((exclusion_margin(&cat, &jack) - 3.0).abs() < 1e-12);

        // radii 10 and 30: sigma 10, margin 20
        let cat = ObjectCatalog::new(100, 100, vec![disc(0.0, 0.0, 10.0), disc(90.0, 0.0, 30.0)]);
        let jack = Jack::from_catalog(&cat, 0).expect("jack");
        assert!((exclusion_margin(&cat, &jack) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn drops_jack_and_touching_objects() {
        let cat = ObjectCatalog::new(
            500,
            500,
            vec![
                disc(100.0, 100.0, 20.0),
                disc(140.0, 100.0, 20.0), // touching
                disc(300.0, 100.0, 20.0),
                disc(100.0, 400.0, 20.0),
            ],
        );
        let jack = Jack::from_catalog(&cat, 0).expect("jack");
        let kept = filter_overlapping(&cat, &jack);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].center_x, 300.0);
        assert_eq!(kept[1].center_y, 400.0);
    }

    #[test]
    fn single_object_catalog_is_empty() {
        let cat = ObjectCatalog::new(10, 10, vec![disc(5.0, 5.0, 3.0)]);
        let jack = Jack::from_catalog(&cat, 0).expect("jack");
        assert!(filter_overlapping(&cat, &jack).is_empty());
    }
}
