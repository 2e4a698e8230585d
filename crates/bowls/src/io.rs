//! JSON configuration for the pipeline, cache and orchestrator.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bowls_core::DetectionConfig;
use bowls_measure::DEFAULT_JACK_DIAMETER_MM;
use serde::{Deserialize, Serialize};

use crate::{
    CachePolicy, FsCacheStore, Orchestrator, OrchestratorConfig, Pipeline, PipelineParams,
    ResultCache, SettingsStore,
};

#[derive(thiserror::Error, Debug)]
pub enum MeasureIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_jack_diameter_mm() -> f64 {
    DEFAULT_JACK_DIAMETER_MM
}

/// Everything a measurement run can be tuned with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasureConfig {
    /// Base thresholds; a `detection_config` setting overrides them.
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub pipeline: PipelineParams,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub cache: CachePolicy,
    #[serde(default = "default_jack_diameter_mm")]
    pub jack_diameter_mm: f64,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            pipeline: PipelineParams::default(),
            orchestrator: OrchestratorConfig::default(),
            cache: CachePolicy::default(),
            jack_diameter_mm: DEFAULT_JACK_DIAMETER_MM,
        }
    }
}

impl MeasureConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, MeasureIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), MeasureIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn build_pipeline(&self) -> Pipeline {
        Pipeline::new(self.pipeline.clone())
    }

    /// Orchestrator over `settings`, caching under `cache_dir` when given.
    pub fn build_orchestrator(
        &self,
        settings: Arc<dyn SettingsStore>,
        cache_dir: Option<&Path>,
    ) -> Result<Orchestrator, MeasureIoError> {
        let mut orchestrator = Orchestrator::new(self.build_pipeline(), settings)
            .with_config(self.orchestrator.clone())
            .with_detection_config(self.detection.clone());
        if let Some(dir) = cache_dir {
            let store = FsCacheStore::open(dir)?;
            orchestrator =
                orchestrator.with_cache(ResultCache::new(Box::new(store), self.cache.clone()));
        }
        Ok(orchestrator)
    }
}
