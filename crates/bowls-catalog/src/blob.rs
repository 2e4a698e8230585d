//! Per-component moment accumulation and ellipse fitting.

use bowls_core::{DetectedObject, Hsv};

/// Raw sums over the pixels of one connected component.
///
/// Pixel `(x, y)` contributes its center `(x + 0.5, y + 0.5)`.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BlobMoments {
    pub count: u64,
    sx: f64,
    sy: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
    rgb: [u64; 3],
}

impl BlobMoments {
    pub fn push(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let px = x as f64 + 0.5;
        let py = y as f64 + 0.5;
        self.count += 1;
        self.sx += px;
        self.sy += py;
        self.sxx += px * px;
        self.syy += py * py;
        self.sxy += px * py;
        for (acc, c) in self.rgb.iter_mut().zip(rgb) {
            *acc += c as u64;
        }
    }

    fn mean_rgb(&self) -> [u8; 3] {
        let n = self.count.max(1);
        self.rgb.map(|c| ((c + n / 2) / n).min(255) as u8)
    }

    /// Ellipse with the same second moments as the component.
    ///
    /// For a filled ellipse the covariance eigenvalues are `a^2/4` and
    /// `b^2/4`, so the semi-axes are `2 * sqrt(lambda)`.
    pub fn to_object(&self) -> Option<DetectedObject> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mx = self.sx / n;
        let my = self.sy / n;
        let cxx = (self.sxx / n - mx * mx).max(0.0);
        let cyy = (self.syy / n - my * my).max(0.0);
        let cxy = self.sxy / n - mx * my;

        let half_tr = 0.5 * (cxx + cyy);
        let disc = (0.25 * (cxx - cyy) * (cxx - cyy) + cxy * cxy).sqrt();
        let l1 = (half_tr + disc).max(0.0);
        let l2 = (half_tr - disc).max(0.0);
        let angle = 0.5 * (2.0 * cxy).atan2(cxx - cyy);

        Some(DetectedObject {
            center_x: mx,
            center_y: my,
            major_axis: 2.0 * l1.sqrt(),
            minor_axis: 2.0 * l2.sqrt(),
            angle: angle.to_degrees(),
            area: n,
            color: Hsv::from_rgb(self.mean_rgb()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn filled_disc_recovers_radius() {
        let mut m = BlobMoments::default();
        let (cx, cy, r) = (50.0, 40.0, 20.0);
        for y in 0..100u32 {
            for x in 0..100u32 {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                if dx * dx + dy * dy <= r * r {
                    m.push(x, y, [200, 10, 10]);
                }
            }
        }
        let obj = m.to_object().expect("object");
        assert_abs_diff_eq!(obj.center_x, cx, epsilon = 1e-9);
        assert_abs_diff_eq!(obj.center_y, cy, epsilon = 1e-9);
        assert_abs_diff_eq!(obj.radius(), r, epsilon = 0.5);
        assert!(obj.aspect_ratio() < 1.02);
        assert_abs_diff_eq!(obj.color.h, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn horizontal_bar_is_elongated_along_x() {
        let mut m = BlobMoments::default();
        for y in 10..20u32 {
            for x in 10..70u32 {
                m.push(x, y, [0, 0, 0]);
            }
        }
        let obj = m.to_object().expect("object");
        assert!(obj.aspect_ratio() > 4.0);
        assert_abs_diff_eq!(obj.angle, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_component_has_no_object() {
        assert!(BlobMoments::default().to_object().is_none());
    }
}
