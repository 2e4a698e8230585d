//! Read-only key-value settings seam.
//!
//! Persisted settings are owned by the host application. The core only
//! reads them, once per processing call, on the calling task.

use std::collections::HashMap;

use bowls_core::{DetectionConfig, Hsv, TeamColorReference};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const KEY_DETECTION_CONFIG: &str = "detection_config";
pub const KEY_TEAM_A_COLOR: &str = "team_a_color";
pub const KEY_TEAM_B_COLOR: &str = "team_b_color";
pub const KEY_TEAM_A_NAME: &str = "team_a_name";
pub const KEY_TEAM_B_NAME: &str = "team_b_name";

/// String values by key; JSON for structured values.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory store for tests and the CLI.
#[derive(Clone, Debug, Default)]
pub struct MemorySettings {
    values: HashMap<String, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Immutable configuration handed to the worker.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SettingsSnapshot {
    pub detection: DetectionConfig,
    pub teams: TeamColorReference,
}

fn read_json<T: DeserializeOwned>(store: &dyn SettingsStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("ignoring malformed setting {key}: {e}");
            None
        }
    }
}

/// Read a snapshot. Missing, malformed or invalid values fall back to
/// `base` (detection) or to no calibration (teams).
pub fn load_snapshot(store: &dyn SettingsStore, base: &DetectionConfig) -> SettingsSnapshot {
    let detection = match read_json::<DetectionConfig>(store, KEY_DETECTION_CONFIG) {
        Some(cfg) => match cfg.validate() {
            Ok(()) => cfg,
            Err(e) => {
                log::warn!("stored detection config rejected: {e}");
                base.clone()
            }
        },
        None => base.clone(),
    };

    let teams = TeamColorReference {
        team_a: read_json::<Hsv>(store, KEY_TEAM_A_COLOR),
        team_b: read_json::<Hsv>(store, KEY_TEAM_B_COLOR),
        team_a_name: store.get(KEY_TEAM_A_NAME).filter(|s| !s.trim().is_empty()),
        team_b_name: store.get(KEY_TEAM_B_NAME).filter(|s| !s.trim().is_empty()),
    };

    SettingsSnapshot { detection, teams }
}
