//! Async front door: one measurement at a time, bounded by a timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bowls_core::DetectionConfig;
use bowls_measure::{MeasurementResult, ResultAssembler, ResultMeta};
use serde::{Deserialize, Serialize};

use crate::{
    load_snapshot, ErrorKind, MeasureRequest, Pipeline, ProcessError, ResultCache,
    SettingsStore, Stage, StageCell,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on one pipeline run.
    pub timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl OrchestratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// What the caller gets back from [`Orchestrator::process`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub success: bool,
    /// The measurement, or a bowl-less fallback for recoverable failures.
    pub result: Option<MeasurementResult>,
    /// Human-readable failure.
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Technical failure detail for logs.
    pub detail: Option<String>,
    pub from_cache: bool,
}

impl ProcessingOutcome {
    fn success(result: MeasurementResult, from_cache: bool) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            error_kind: None,
            detail: None,
            from_cache,
        }
    }

    fn failure(err: &ProcessError, fallback: Option<MeasurementResult>) -> Self {
        Self {
            success: false,
            result: fallback,
            error: Some(err.user_message()),
            error_kind: Some(err.kind()),
            detail: Some(err.to_string()),
            from_cache: false,
        }
    }
}

/// Holds the busy flag for as long as it lives.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs the [`Pipeline`] on a blocking worker.
///
/// A second call while a run is in flight returns `Busy` straight away. A
/// timed-out run keeps the orchestrator busy until its worker returns.
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    settings: Arc<dyn SettingsStore>,
    cache: Option<Arc<Mutex<ResultCache>>>,
    busy: Arc<AtomicBool>,
    stage: Arc<StageCell>,
    config: OrchestratorConfig,
    base_detection: DetectionConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pipeline", &self.pipeline)
            .field("stage", &self.stage.get())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(pipeline: Pipeline, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            settings,
            cache: None,
            busy: Arc::new(AtomicBool::new(false)),
            stage: Arc::new(StageCell::default()),
            config: OrchestratorConfig::default(),
            base_detection: DetectionConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(Arc::new(Mutex::new(cache)));
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Detection config used when the settings store has none.
    pub fn with_detection_config(mut self, cfg: DetectionConfig) -> Self {
        self.base_detection = cfg;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage.get()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn process(&self, request: MeasureRequest) -> ProcessingOutcome {
        let Some(guard) = BusyGuard::acquire(&self.busy) else {
            log::warn!("rejecting request: measurement in progress");
            return ProcessingOutcome::failure(&ProcessError::Busy, None);
        };
        self.stage.reset();

        let snapshot = load_snapshot(self.settings.as_ref(), &self.base_detection);
        let key = self.pipeline.cache_key(&request, &snapshot);

        if let Some(key) = &key {
            if let Some(hit) = self.cache_get(key).await {
                log::info!("cache hit for {key}");
                self.stage.set(Stage::Done);
                return ProcessingOutcome::success(hit, true);
            }
        }

        let meta = ResultMeta {
            image_ref: request.image_ref.clone(),
            ..ResultMeta::default()
        };
        let pipeline = self.pipeline.clone();
        let stage = self.stage.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            pipeline.run(&request, &snapshot, &stage)
        });

        let timeout = self.config.timeout();
        let outcome = match tokio::time::timeout(timeout, worker).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(join)) => Err(ProcessError::Worker(join.to_string())),
            Err(_) => Err(ProcessError::Timeout(timeout)),
        };

        match outcome {
            Ok(result) => {
                if let Some(key) = key {
                    self.cache_put(key, result.clone()).await;
                }
                ProcessingOutcome::success(result, false)
            }
            Err(e) => {
                self.stage.freeze(Stage::Failed);
                log::warn!("measurement failed: {e}");
                let fallback = e.has_fallback_artifact().then(|| {
                    let (image_width, image_height) = e.image_size().unzip();
                    let meta = ResultMeta {
                        image_width,
                        image_height,
                        ..meta
                    };
                    ResultAssembler.fallback(meta, e.user_message())
                });
                ProcessingOutcome::failure(&e, fallback)
            }
        }
    }

    async fn cache_get(&self, key: &str) -> Option<MeasurementResult> {
        let cache = self.cache.clone()?;
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let mut cache = cache.lock().ok()?;
            cache.get(&key)
        })
        .await
        .ok()
        .flatten()
    }

    async fn cache_put(&self, key: String, result: MeasurementResult) {
        let Some(cache) = self.cache.clone() else {
            return;
        };
        let stored = tokio::task::spawn_blocking(move || {
            if let Ok(mut cache) = cache.lock() {
                cache.put(&key, &result);
            }
        })
        .await;
        if let Err(e) = stored {
            log::warn!("cache write failed: {e}");
        }
    }
}
