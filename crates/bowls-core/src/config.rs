use serde::{Deserialize, Serialize};

use crate::{Hsv, HsvRange};

/// Errors raised by configuration validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("HSV upper bound {upper:?} is below lower bound {lower:?}")]
    HsvBoundsInverted { lower: [u8; 3], upper: [u8; 3] },
    #[error("contour area range is empty (min={min}, max={max})")]
    AreaRange { min: f64, max: f64 },
    #[error("max aspect ratio must be >= 1 (got {0})")]
    AspectRatio(f64),
    #[error("blur kernel size must be odd (got {0})")]
    BlurKernel(u32),
}

/// Snapshot of the detection thresholds used for one processing call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Lower HSV bound of the jack's reference color (OpenCV scale).
    pub hsv_lower: [u8; 3],
    /// Upper HSV bound of the jack's reference color (OpenCV scale).
    pub hsv_upper: [u8; 3],
    /// Blur kernel size in pixels; `0` or `1` disables blurring.
    pub blur_kernel_size: u32,
    pub min_contour_area: f64,
    pub max_contour_area: f64,
    /// Largest major/minor ratio still considered jack-like.
    pub max_aspect_ratio: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            hsv_lower: [0, 0, 180],
            hsv_upper: [179, 60, 255],
            blur_kernel_size: 5,
            min_contour_area: 200.0,
            max_contour_area: 200_000.0,
            max_aspect_ratio: 1.8,
        }
    }
}

impl DetectionConfig {
    pub fn jack_color_range(&self) -> HsvRange {
        HsvRange {
            lower: self.hsv_lower,
            upper: self.hsv_upper,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.jack_color_range().is_ordered() {
            return Err(ConfigError::HsvBoundsInverted {
                lower: self.hsv_lower,
                upper: self.hsv_upper,
            });
        }
        if !(self.min_contour_area >= 0.0 && self.min_contour_area <= self.max_contour_area) {
            return Err(ConfigError::AreaRange {
                min: self.min_contour_area,
                max: self.max_contour_area,
            });
        }
        if !(self.max_aspect_ratio >= 1.0) {
            return Err(ConfigError::AspectRatio(self.max_aspect_ratio));
        }
        if self.blur_kernel_size > 1 && self.blur_kernel_size % 2 == 0 {
            return Err(ConfigError::BlurKernel(self.blur_kernel_size));
        }
        Ok(())
    }
}

/// Calibrated team colors. Classification by nearest reference only
/// happens when both teams are calibrated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamColorReference {
    pub team_a: Option<Hsv>,
    pub team_b: Option<Hsv>,
    pub team_a_name: Option<String>,
    pub team_b_name: Option<String>,
}

impl TeamColorReference {
    pub fn calibrated(team_a: Hsv, team_b: Hsv) -> Self {
        Self {
            team_a: Some(team_a),
            team_b: Some(team_b),
            ..Self::default()
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.team_a.is_some() && self.team_b.is_some()
    }
}
