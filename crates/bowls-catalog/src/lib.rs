//! Object catalog production for bowls measurement.
//!
//! The pipeline only needs "round objects with a center, axes and a mean
//! color". [`ObjectDetector`] is that seam; [`BlobObjectDetector`] is the
//! default implementation built on `image` + `imageproc`:
//!
//! 1. Gaussian blur (OpenCV kernel-size to sigma rule),
//! 2. background color from the image border,
//! 3. foreground mask from background distance and the jack color range,
//! 4. 8-connected components,
//! 5. moment ellipse per component, filtered by area.

mod blob;
mod detector;

pub use detector::{BlobObjectDetector, CatalogParams, ObjectDetector};
