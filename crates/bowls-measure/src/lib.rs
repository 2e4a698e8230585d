//! Decision logic of a bowls measurement.
//!
//! Given an [`ObjectCatalog`](bowls_core::ObjectCatalog) this crate picks the
//! jack, drops objects overlapping it, assigns teams by color, converts pixel
//! geometry to centimeters (jack scale or fiducial homography) and ranks the
//! bowls.
//!
//! ## Quickstart
//!
//! ```
//! use bowls_core::{DetectedObject, Hsv, ObjectCatalog};
//! use bowls_measure::{
//!     filter_overlapping, select_jack, DistanceCalculator, Jack, JackSelectorParams,
//! };
//!
//! let red = Hsv::new(2.0, 200.0, 180.0);
//! let catalog = ObjectCatalog::new(
//!     640,
//!     480,
//!     vec![
//!         DetectedObject::circle(300.0, 200.0, 20.0, Hsv::new(0.0, 0.0, 250.0)),
//!         DetectedObject::circle(450.0, 200.0, 30.0, red),
//!     ],
//! );
//! let idx = select_jack(&catalog, &JackSelectorParams::default()).unwrap();
//! let jack = Jack::from_catalog(&catalog, idx).unwrap();
//! let bowls = filter_overlapping(&catalog, &jack);
//! let calc = DistanceCalculator::fast(&jack.object, 63.5).unwrap();
//! assert_eq!(calc.distance_cm(1, &jack.object, &bowls[0]).unwrap(), 15.9);
//! ```

mod assemble;
mod distance;
mod exclusion;
mod jack;
mod metrology;
mod result;
mod team;

pub use assemble::{ResultAssembler, ResultMeta};
pub use distance::{round_to_tenth, DistanceCalculator, DistanceError, DEFAULT_JACK_DIAMETER_MM};
pub use exclusion::{exclusion_margin, filter_overlapping, MIN_MARGIN_JACK_FRACTION};
pub use jack::{select_jack, select_manual_jack, Jack, JackSelectorParams};
pub use metrology::{
    remove_fiducial_objects, MetrologyCorrector, MetrologyError, MetrologyParams,
    PerspectiveCorrection,
};
pub use result::{
    BowlMeasurement, CorrectedMeasurement, InvariantError, JackPosition, MeasurementResult,
};
pub use team::{ColorBucket, Team, TeamAssignment, TeamClassifier};
