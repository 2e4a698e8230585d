//! Ranking and final record construction.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{BowlMeasurement, JackPosition, MeasurementResult};

/// Everything about a run except the bowls themselves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultMeta {
    pub image_ref: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub using_high_accuracy: bool,
    pub accuracy_message: Option<String>,
    pub jack: Option<JackPosition>,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Sorts bowls by distance, assigns ranks and stamps the record.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultAssembler;

impl ResultAssembler {
    /// Zero bowls is a valid, reportable result.
    pub fn assemble(&self, mut bowls: Vec<BowlMeasurement>, meta: ResultMeta) -> MeasurementResult {
        bowls.sort_by(|a, b| {
            a.distance_from_jack
                .total_cmp(&b.distance_from_jack)
                .then(a.id.cmp(&b.id))
        });
        for (i, b) in bowls.iter_mut().enumerate() {
            b.rank = i as u32 + 1;
        }

        MeasurementResult {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp_ms: now_ms(),
            image_ref: meta.image_ref,
            bowls,
            using_high_accuracy: meta.using_high_accuracy,
            accuracy_message: meta.accuracy_message,
            image_width: meta.image_width,
            image_height: meta.image_height,
            jack: meta.jack,
        }
    }

    /// Displayable artifact for a failed run: the raw image, no bowls.
    pub fn fallback(&self, meta: ResultMeta, message: impl Into<String>) -> MeasurementResult {
        self.assemble(
            Vec::new(),
            ResultMeta {
                using_high_accuracy: false,
                accuracy_message: Some(message.into()),
                jack: None,
                ..meta
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Team;

    fn bowl(id: u32, d: f64) -> BowlMeasurement {
        BowlMeasurement {
            id,
            team_label: "Red".into(),
            team: Team::TeamA,
            distance_from_jack: d,
            rank: 0,
            x: 0.0,
            y: 0.0,
        }
    }

    #[test]
    fn ranks_follow_distance_with_id_ties() {
        let result = ResultAssembler.assemble(
            vec![bowl(3, 12.5), bowl(1, 40.0), bowl(4, 3.2), bowl(2, 12.5)],
            ResultMeta::default(),
        );
        let ids: Vec<u32> = result.bowls.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
        let ranks: Vec<u32> = result.bowls.iter().map(|b| b.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert_eq!(result.leader().map(|b| b.id), Some(4));
        result.check_invariants().expect("invariants");
    }

    #[test]
    fn empty_result_is_valid() {
        let result = ResultAssembler.assemble(
            Vec::new(),
            ResultMeta {
                image_width: Some(800),
                image_height: Some(600),
                ..ResultMeta::default()
            },
        );
        assert!(result.bowls.is_empty());
        assert_eq!(result.image_width, Some(800));
        assert!(result.check_invariants().is_ok());
        assert!(!result.id.is_empty());
    }

    #[test]
    fn fallback_is_never_high_accuracy() {
        let meta = ResultMeta {
            image_ref: Some("shot.jpg".into()),
            using_high_accuracy: true,
            ..ResultMeta::default()
        };
        let result = ResultAssembler.fallback(meta, "no jack");
        assert!(!result.using_high_accuracy);
        assert_eq!(result.image_ref.as_deref(), Some("shot.jpg"));
        assert_eq!(result.accuracy_message.as_deref(), Some("no jack"));
    }
}
