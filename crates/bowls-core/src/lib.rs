//! Core types and utilities for photo-based bowls measurement.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete image decoder or object detector: the catalog,
//! fiducial and measurement crates build on the types defined here.

mod color;
mod config;
mod homography;
mod image;
mod logger;
mod object;

pub use color::{hsv_distance, hue_distance, rgb_to_hsv, Hsv, HsvRange};
pub use config::{ConfigError, DetectionConfig, TeamColorReference};
pub use homography::{homography_from_4pt, Homography};
pub use image::{GrayImage, GrayImageView};
pub use object::{DetectedObject, ObjectCatalog};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level};
