//! Team assignment by color.

use std::fmt;

use bowls_core::{hsv_distance, DetectedObject, Hsv, TeamColorReference};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Team of a bowl. Parsing is total: unrecognized labels become `Unknown`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Team {
    TeamA,
    TeamB,
    #[default]
    Unknown,
}

impl Team {
    pub fn as_str(self) -> &'static str {
        match self {
            Team::TeamA => "teamA",
            Team::TeamB => "teamB",
            Team::Unknown => "unknown",
        }
    }

    /// Accepts `teamA`, `team_a`, `team a`, `a` (any case), likewise for B.
    pub fn parse(label: &str) -> Self {
        let norm: String = label
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | ' ' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match norm.as_str() {
            "teama" | "a" => Team::TeamA,
            "teamb" | "b" => Team::TeamB,
            _ => Team::Unknown,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Team {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Team {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Team::parse(&label))
    }
}

/// Default color buckets, in tie-break order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorBucket {
    Black,
    Red,
    Yellow,
    Green,
    Blue,
}

impl ColorBucket {
    pub const ALL: [ColorBucket; 5] = [
        ColorBucket::Black,
        ColorBucket::Red,
        ColorBucket::Yellow,
        ColorBucket::Green,
        ColorBucket::Blue,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ColorBucket::Black => "Black",
            ColorBucket::Red => "Red",
            ColorBucket::Yellow => "Yellow",
            ColorBucket::Green => "Green",
            ColorBucket::Blue => "Blue",
        }
    }

    /// Bucket of an OpenCV-scale color, if any.
    pub fn of(c: &Hsv) -> Option<Self> {
        if c.v < 50.0 {
            return Some(ColorBucket::Black);
        }
        if c.s < 80.0 {
            return None;
        }
        match c.h {
            h if !(10.0..170.0).contains(&h) => Some(ColorBucket::Red),
            h if (20.0..36.0).contains(&h) => Some(ColorBucket::Yellow),
            h if (36.0..86.0).contains(&h) => Some(ColorBucket::Green),
            h if (86.0..131.0).contains(&h) => Some(ColorBucket::Blue),
            _ => None,
        }
    }

    fn rank(self) -> usize {
        self as usize
    }
}

/// Team and display label of one bowl.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamAssignment {
    pub team: Team,
    pub label: String,
}

impl TeamAssignment {
    fn unknown() -> Self {
        Self {
            team: Team::Unknown,
            label: "Unknown".to_string(),
        }
    }
}

/// Assigns teams from calibrated references, or from default color buckets
/// when the references are incomplete. Never fails.
#[derive(Clone, Debug, Default)]
pub struct TeamClassifier {
    reference: TeamColorReference,
}

impl TeamClassifier {
    pub fn new(reference: TeamColorReference) -> Self {
        Self { reference }
    }

    pub fn is_calibrated(&self) -> bool {
        self.reference.is_calibrated()
    }

    /// One assignment per object, in input order.
    pub fn classify(&self, objects: &[DetectedObject]) -> Vec<TeamAssignment> {
        match (self.reference.team_a, self.reference.team_b) {
            (Some(a), Some(b)) => objects
                .iter()
                .map(|o| self.nearest_reference(&o.color, &a, &b))
                .collect(),
            _ => classify_by_buckets(objects),
        }
    }

    fn nearest_reference(&self, c: &Hsv, a: &Hsv, b: &Hsv) -> TeamAssignment {
        if hsv_distance(c, a) <= hsv_distance(c, b) {
            TeamAssignment {
                team: Team::TeamA,
                label: self
                    .reference
                    .team_a_name
                    .clone()
                    .unwrap_or_else(|| "Team A".to_string()),
            }
        } else {
            TeamAssignment {
                team: Team::TeamB,
                label: self
                    .reference
                    .team_b_name
                    .clone()
                    .unwrap_or_else(|| "Team B".to_string()),
            }
        }
    }
}

/// The two most populous buckets of the frame become team A and team B.
fn classify_by_buckets(objects: &[DetectedObject]) -> Vec<TeamAssignment> {
    let buckets: Vec<Option<ColorBucket>> =
        objects.iter().map(|o| ColorBucket::of(&o.color)).collect();

    let mut counts = [0usize; ColorBucket::ALL.len()];
    for b in buckets.iter().flatten() {
        counts[b.rank()] += 1;
    }
    let mut ordered: Vec<ColorBucket> = ColorBucket::ALL
        .into_iter()
        .filter(|b| counts[b.rank()] > 0)
        .collect();
    // stable: equal counts keep bucket order
    ordered.sort_by(|a, b| counts[b.rank()].cmp(&counts[a.rank()]));

    let team_of = |bucket: ColorBucket| match ordered.iter().position(|&b| b == bucket) {
        Some(0) => Team::TeamA,
        Some(1) => Team::TeamB,
        _ => Team::Unknown,
    };

    buckets
        .into_iter()
        .map(|b| match b {
            Some(bucket) => TeamAssignment {
                team: team_of(bucket),
                label: bucket.label().to_string(),
            },
            None => TeamAssignment::unknown(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colored(c: Hsv) -> DetectedObject {
        DetectedObject::circle(0.0, 0.0, 10.0, c)
    }

    const RED: Hsv = Hsv::new(2.0, 200.0, 180.0);
    const BLUE: Hsv = Hsv::new(110.0, 200.0, 180.0);
    const YELLOW: Hsv = Hsv::new(28.0, 200.0, 200.0);
    const BLACK: Hsv = Hsv::new(0.0, 0.0, 20.0);
    const GREY: Hsv = Hsv::new(0.0, 10.0, 150.0);

    #[test]
    fn team_labels_map_totally() {
        for (label, team) in [
            ("teamA", Team::TeamA),
            ("team_a", Team::TeamA),
            ("Team A", Team::TeamA),
            ("a", Team::TeamA),
            ("TEAMB", Team::TeamB),
            ("b", Team::TeamB),
            ("unknown", Team::Unknown),
            ("purple", Team::Unknown),
            ("", Team::Unknown),
        ] {
            assert_eq!(Team::parse(label), team, "{label}");
        }
        for team in [Team::TeamA, Team::TeamB, Team::Unknown] {
            assert_eq!(Team::parse(team.as_str()), team);
        }
    }

    #[test]
    fn team_serde_is_total() {
        let t: Team = serde_json::from_str("\"mystery\"").expect("json");
        assert_eq!(t, Team::Unknown);
        assert_eq!(serde_json::to_string(&Team::TeamB).expect("json"), "\"teamB\"");
    }

    #[test]
    fn buckets_follow_hue_ranges() {
        assert_eq!(ColorBucket::of(&RED), Some(ColorBucket::Red));
        assert_eq!(ColorBucket::of(&Hsv::new(175.0, 200.0, 200.0)), Some(ColorBucket::Red));
        assert_eq!(ColorBucket::of(&YELLOW), Some(ColorBucket::Yellow));
        assert_eq!(ColorBucket::of(&Hsv::new(60.0, 200.0, 200.0)), Some(ColorBucket::Green));
        assert_eq!(ColorBucket::of(&BLUE), Some(ColorBucket::Blue));
        assert_eq!(ColorBucket::of(&BLACK), Some(ColorBucket::Black));
        assert_eq!(ColorBucket::of(&GREY), None);
        assert_eq!(ColorBucket::of(&Hsv::new(15.0, 200.0, 200.0)), None);
        assert_eq!(ColorBucket::of(&Hsv::new(150.0, 200.0, 200.0)), None);
    }

    #[test]
    fn default_mode_picks_two_largest_buckets() {
        let objs: Vec<_> = [BLUE, RED, BLUE, YELLOW, RED, BLUE, GREY]
            .into_iter()
            .map(colored)
            .collect();
        let out = TeamClassifier::default().classify(&objs);

        assert_eq!(out[0].team, Team::TeamA);
        assert_eq!(out[0].label, "Blue");
        assert_eq!(out[1].team, Team::TeamB);
        assert_eq!(out[1].label, "Red");
        assert_eq!(out[3].team, Team::Unknown);
        assert_eq!(out[3].label, "Yellow");
        assert_eq!(out[6], TeamAssignment::unknown());
    }

    #[test]
    fn default_mode_ties_follow_bucket_order() {
        let objs: Vec<_> = [BLUE, RED].into_iter().map(colored).collect();
        let out = TeamClassifier::default().classify(&objs);
        assert_eq!(out[0].team, Team::TeamB);
        assert_eq!(out[1].team, Team::TeamA);
    }

    #[test]
    fn calibrated_mode_uses_nearest_reference_and_names() {
        let mut reference = TeamColorReference::calibrated(RED, BLUE);
        reference.team_b_name = Some("Visitors".into());
        let classifier = TeamClassifier::new(reference);
        assert!(classifier.is_calibrated());

        let objs: Vec<_> = [Hsv::new(178.0, 190.0, 170.0), Hsv::new(105.0, 150.0, 200.0)]
            .into_iter()
            .map(colored)
            .collect();
        let out = classifier.classify(&objs);
        assert_eq!(out[0].team, Team::TeamA);
        assert_eq!(out[0].label, "Team A");
        assert_eq!(out[1].team, Team::TeamB);
        assert_eq!(out[1].label, "Visitors");
    }

    #[test]
    fn half_calibrated_falls_back_to_buckets() {
        let reference = TeamColorReference {
            team_a: Some(RED),
            ..TeamColorReference::default()
        };
        let out = TeamClassifier::new(reference).classify(&[colored(BLUE)]);
        assert_eq!(out[0].label, "Blue");
    }
}
