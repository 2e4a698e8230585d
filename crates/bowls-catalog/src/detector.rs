//! Default object detector: color segmentation against the mat background.

use bowls_core::{DetectedObject, DetectionConfig, Hsv, ObjectCatalog};
use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::blob::BlobMoments;

/// Produces the object catalog of one frame.
///
/// Implementations must be deterministic for a given image and config.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, image: &RgbImage, cfg: &DetectionConfig) -> ObjectCatalog;
}

/// Parameters of [`BlobObjectDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogParams {
    /// RGB distance from the background color above which a pixel is foreground.
    pub background_distance: f64,
    /// Width of the border band used to estimate the background, as a
    /// fraction of the shorter image side.
    pub border_frac: f64,
}

impl Default for CatalogParams {
    fn default() -> Self {
        Self {
            background_distance: 60.0,
            border_frac: 0.02,
        }
    }
}

/// Segments objects that stand out from a roughly uniform background, or
/// that match the jack color range.
#[derive(Clone, Debug, Default)]
pub struct BlobObjectDetector {
    params: CatalogParams,
}

impl BlobObjectDetector {
    pub fn new(params: CatalogParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CatalogParams {
        &self.params
    }
}

/// OpenCV's sigma for a Gaussian kernel of size `k`.
pub(crate) fn kernel_sigma(k: u32) -> Option<f32> {
    if k <= 1 {
        return None;
    }
    Some(0.3 * ((k as f32 - 1.0) * 0.5 - 1.0) + 0.8)
}

/// Per-channel median of the pixels in the outer band of the image.
pub(crate) fn border_median(img: &RgbImage, border_frac: f64) -> [u8; 3] {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return [0; 3];
    }
    let band = ((border_frac * w.min(h) as f64).round() as u32).clamp(1, w.min(h));

    let mut channels: [Vec<u8>; 3] = Default::default();
    for (x, y, p) in img.enumerate_pixels() {
        if x < band || y < band || x + band >= w || y + band >= h {
            for (c, v) in channels.iter_mut().zip(p.0) {
                c.push(v);
            }
        }
    }

    channels.map(|mut c| {
        if c.is_empty() {
            return 0;
        }
        let mid = c.len() / 2;
        *c.select_nth_unstable(mid).1
    })
}

fn rgb_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

impl ObjectDetector for BlobObjectDetector {
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image, cfg),
            fields(w = image.width(), h = image.height())
        )
    )]
    fn detect(&self, image: &RgbImage, cfg: &DetectionConfig) -> ObjectCatalog {
        let (w, h) = image.dimensions();
        let blurred = match kernel_sigma(cfg.blur_kernel_size) {
            Some(sigma) => imageproc::filter::gaussian_blur_f32(image, sigma),
            None => image.clone(),
        };

        let background = border_median(&blurred, self.params.border_frac);
        let jack_range = cfg.jack_color_range();
        // a background that already looks like the jack says nothing about the jack
        let use_jack_range = !jack_range.contains(&Hsv::from_rgb(background));
        log::debug!("background rgb {background:?}, jack color gate: {use_jack_range}");

        let mask = GrayImage::from_fn(w, h, |x, y| {
            let p = blurred.get_pixel(x, y).0;
            let far = rgb_distance(p, background) > self.params.background_distance;
            let jack_like = use_jack_range && jack_range.contains(&Hsv::from_rgb(p));
            Luma([if far || jack_like { 255 } else { 0 }])
        });
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

        let mut blobs: Vec<BlobMoments> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let l = label[0] as usize;
            if l == 0 {
                continue;
            }
            if blobs.len() < l {
                blobs.resize(l, BlobMoments::default());
            }
            blobs[l - 1].push(x, y, image.get_pixel(x, y).0);
        }

        let mut objects: Vec<DetectedObject> = blobs
            .iter()
            .filter(|b| {
                let area = b.count as f64;
                area >= cfg.min_contour_area && area <= cfg.max_contour_area
            })
            .filter_map(BlobMoments::to_object)
            .collect();

        objects.sort_by(|a, b| {
            b.area
                .total_cmp(&a.area)
                .then(a.center_y.total_cmp(&b.center_y))
                .then(a.center_x.total_cmp(&b.center_x))
        });
        log::debug!(
            "{} components, {} objects within area range",
            blobs.len(),
            objects.len()
        );

        ObjectCatalog::new(w, h, objects)
    }
}
