//! Measurement records handed to callers and the cache.

use serde::{Deserialize, Serialize};

use crate::Team;

/// One ranked bowl.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BowlMeasurement {
    pub id: u32,
    pub team_label: String,
    pub team: Team,
    /// Centimeters from the jack, one decimal.
    pub distance_from_jack: f64,
    /// 1-based; `0` until assembled.
    pub rank: u32,
    /// Original-image pixel coordinates of the bowl center.
    pub x: f64,
    pub y: f64,
}

/// Jack location in original-image pixels, for overlays.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JackPosition {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

/// Distance of a bowl on the perspective-corrected path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrectedMeasurement {
    pub id: u32,
    pub color: String,
    pub distance_cm: f64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InvariantError {
    #[error("bowl at position {index} has rank {rank}, expected {}", .index + 1)]
    Rank { index: usize, rank: u32 },
    #[error("bowl at position {index} is closer than the one before it")]
    Order { index: usize },
    #[error("bowl at position {index} has invalid distance {distance}")]
    Distance { index: usize, distance: f64 },
}

/// Outcome of one measurement run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub id: String,
    pub timestamp_ms: u64,
    pub image_ref: Option<String>,
    /// Ascending by distance, ranks `1..=N`.
    pub bowls: Vec<BowlMeasurement>,
    pub using_high_accuracy: bool,
    pub accuracy_message: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    #[serde(default)]
    pub jack: Option<JackPosition>,
}

impl MeasurementResult {
    /// Ordering and rank invariants of `bowls`.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        for (index, b) in self.bowls.iter().enumerate() {
            if !(b.distance_from_jack.is_finite() && b.distance_from_jack >= 0.0) {
                return Err(InvariantError::Distance {
                    index,
                    distance: b.distance_from_jack,
                });
            }
            if b.rank as usize != index + 1 {
                return Err(InvariantError::Rank { index, rank: b.rank });
            }
            if index > 0 && self.bowls[index - 1].distance_from_jack > b.distance_from_jack {
                return Err(InvariantError::Order { index });
            }
        }
        Ok(())
    }

    /// Closest bowl, if any.
    pub fn leader(&self) -> Option<&BowlMeasurement> {
        self.bowls.first()
    }
}
