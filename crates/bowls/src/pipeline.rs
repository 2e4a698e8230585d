//! Synchronous end-to-end measurement from image bytes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use bowls_catalog::{BlobObjectDetector, CatalogParams, ObjectDetector};
use bowls_core::ObjectCatalog;
use bowls_measure::{
    filter_overlapping, select_jack, select_manual_jack, BowlMeasurement, DistanceCalculator,
    remove_fiducial_objects, DistanceError, Jack, JackPosition, JackSelectorParams,
    MeasurementResult, MetrologyCorrector, MetrologyError, MetrologyParams, ResultAssembler,
    ResultMeta, TeamClassifier, DEFAULT_JACK_DIAMETER_MM,
};
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Fingerprint, ProcessError, SettingsSnapshot};

/// Processing stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Detecting,
    Filtering,
    Classifying,
    Correcting,
    Computing,
    Assembling,
    Done,
    Failed,
}

/// Shared view of the current stage.
///
/// Once a run is abandoned (timeout) the cell is frozen so the still-running
/// worker cannot overwrite the terminal stage.
#[derive(Debug)]
pub struct StageCell {
    inner: Mutex<(Stage, bool)>,
}

impl Default for StageCell {
    fn default() -> Self {
        Self {
            inner: Mutex::new((Stage::Idle, false)),
        }
    }
}

impl StageCell {
    pub fn get(&self) -> Stage {
        self.inner.lock().map(|g| g.0).unwrap_or(Stage::Failed)
    }

    pub fn set(&self, stage: Stage) {
        if let Ok(mut g) = self.inner.lock() {
            if !g.1 && g.0 != stage {
                log::debug!("stage {:?} -> {:?}", g.0, stage);
                g.0 = stage;
            }
        }
    }

    /// Start a new run at `Idle`.
    pub fn reset(&self) {
        if let Ok(mut g) = self.inner.lock() {
            *g = (Stage::Idle, false);
        }
    }

    /// Set a terminal stage and ignore further updates until [`reset`](Self::reset).
    pub fn freeze(&self, stage: Stage) {
        if let Ok(mut g) = self.inner.lock() {
            *g = (stage, true);
        }
    }
}

/// Pipeline tuning that is not part of the persisted detection config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub catalog: CatalogParams,
    /// `max_aspect_ratio` is always taken from the detection config.
    pub jack: JackSelectorParams,
    pub metrology: MetrologyParams,
    /// Longest image side processed; larger images are downscaled first.
    pub max_dimension: u32,
    /// Surface perspective-correction failures instead of falling back to
    /// jack-scale distances.
    pub require_high_accuracy: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            catalog: CatalogParams::default(),
            jack: JackSelectorParams::default(),
            metrology: MetrologyParams::default(),
            max_dimension: 1600,
            require_high_accuracy: false,
        }
    }
}

/// One measurement request.
#[derive(Clone, Debug)]
pub struct MeasureRequest {
    /// Compressed image bytes (JPEG, PNG, ...).
    pub image: Vec<u8>,
    /// Reference to the source image, echoed in the result.
    pub image_ref: Option<String>,
    /// Source identity; requests without one bypass the cache.
    pub fingerprint: Option<Fingerprint>,
    /// Jack position in original-image pixels, bypassing jack selection.
    pub manual_jack: Option<(f64, f64)>,
    pub jack_diameter_mm: f64,
    pub high_accuracy: bool,
}

impl MeasureRequest {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            image_ref: None,
            fingerprint: None,
            manual_jack: None,
            jack_diameter_mm: DEFAULT_JACK_DIAMETER_MM,
            high_accuracy: false,
        }
    }

    /// Read an image file; the request carries its path and fingerprint.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let image = std::fs::read(path)?;
        Ok(Self {
            image_ref: Some(path.display().to_string()),
            fingerprint: Some(Fingerprint::from_path(path)?),
            ..Self::new(image)
        })
    }

    pub fn with_high_accuracy(mut self, on: bool) -> Self {
        self.high_accuracy = on;
        self
    }

    pub fn with_jack_diameter(mut self, mm: f64) -> Self {
        self.jack_diameter_mm = mm;
        self
    }

    pub fn with_manual_jack(mut self, x: f64, y: f64) -> Self {
        self.manual_jack = Some((x, y));
        self
    }

    /// Request part of the cache key: the fingerprint plus the request
    /// options that change the result. See [`Pipeline::cache_key`].
    pub fn cache_key(&self) -> Option<String> {
        let fp = self.fingerprint.as_ref()?;
        let mode = if self.high_accuracy { "accurate" } else { "fast" };
        let mut key = format!("{fp}|{mode}|{}", self.jack_diameter_mm);
        if let Some((x, y)) = self.manual_jack {
            key.push_str(&format!("|jack={x:.1},{y:.1}"));
        }
        Some(key)
    }
}

/// The detection-and-metrology pipeline.
pub struct Pipeline {
    detector: Arc<dyn ObjectDetector>,
    params: PipelineParams,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineParams::default())
    }
}

/// Image prepared for detection.
struct WorkingImage {
    image: DynamicImage,
    original_width: u32,
    original_height: u32,
    /// working / original
    scale: f64,
}

fn prepare_image(bytes: &[u8], max_dimension: u32) -> Result<WorkingImage, ProcessError> {
    let image =
        image::load_from_memory(bytes).map_err(|e| ProcessError::DecodeFailure(e.to_string()))?;
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return Err(ProcessError::DecodeFailure("image has no pixels".to_string()));
    }

    let longest = w.max(h);
    if max_dimension == 0 || longest <= max_dimension {
        return Ok(WorkingImage {
            image,
            original_width: w,
            original_height: h,
            scale: 1.0,
        });
    }

    let scale = max_dimension as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    log::debug!("downscaling {w}x{h} to {nw}x{nh}");
    Ok(WorkingImage {
        image: image.resize_exact(nw, nh, FilterType::Triangle),
        original_width: w,
        original_height: h,
        scale: nw as f64 / w as f64,
    })
}

impl WorkingImage {
    fn original_size(&self) -> (u32, u32) {
        (self.original_width, self.original_height)
    }
}

impl Pipeline {
    pub fn new(params: PipelineParams) -> Self {
        let detector = Arc::new(BlobObjectDetector::new(params.catalog.clone()));
        Self { detector, params }
    }

    /// Use another catalog producer.
    pub fn with_detector(detector: Arc<dyn ObjectDetector>, params: PipelineParams) -> Self {
        Self { detector, params }
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Full cache key of `request` under `snapshot`: the request key plus a
    /// digest of the settings and pipeline params, so recalibrating teams or
    /// changing detection settings misses the cache.
    pub fn cache_key(
        &self,
        request: &MeasureRequest,
        snapshot: &SettingsSnapshot,
    ) -> Option<String> {
        let key = request.cache_key()?;
        #[derive(Serialize)]
        struct Inputs<'a> {
            settings: &'a SettingsSnapshot,
            params: &'a PipelineParams,
        }
        let inputs = Inputs {
            settings: snapshot,
            params: &self.params,
        };
        let bytes = serde_json::to_vec(&inputs).ok()?;
        let digest = format!("{:x}", Sha256::digest(bytes));
        Some(format!("{key}|cfg={}", &digest[..16]))
    }

    /// Run every stage on `request`, reporting progress through `stage`.
    ///
    /// Perspective-correction failures downgrade to jack-scale distances
    /// unless [`PipelineParams::require_high_accuracy`] is set.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(accurate = request.high_accuracy))
    )]
    pub fn run(
        &self,
        request: &MeasureRequest,
        snapshot: &SettingsSnapshot,
        stage: &StageCell,
    ) -> Result<MeasurementResult, ProcessError> {
        let cfg = &snapshot.detection;
        cfg.validate()?;
        if !(request.jack_diameter_mm.is_finite() && request.jack_diameter_mm > 0.0) {
            return Err(ProcessError::InvalidConfig(format!(
                "jack diameter must be positive (got {})",
                request.jack_diameter_mm
            )));
        }

        // Detecting
        stage.set(Stage::Detecting);
        let working = prepare_image(&request.image, self.params.max_dimension)?;
        let rgb = working.image.to_rgb8();
        let mut catalog = self.detector.detect(&rgb, cfg);
        log::debug!("catalog: {} objects", catalog.len());

        // markers are never bowls, with or without a usable correction
        let corrector = MetrologyCorrector::new(self.params.metrology.clone());
        let fiducials = corrector.detect(&working.image.to_luma8());
        catalog = remove_fiducial_objects(&catalog, &fiducials);
        let correction = request
            .high_accuracy
            .then(|| corrector.correct_detections(fiducials));

        if catalog.is_empty() && request.manual_jack.is_none() {
            return Err(ProcessError::NoObjectsDetected {
                image_size: working.original_size(),
            });
        }

        // Filtering
        stage.set(Stage::Filtering);
        let jack = self.resolve_jack(&catalog, request, &working, cfg.max_aspect_ratio)?;
        let bowls = filter_overlapping(&catalog, &jack);

        // Classifying
        stage.set(Stage::Classifying);
        let teams = TeamClassifier::new(snapshot.teams.clone()).classify(&bowls);

        // Correcting
        let mut accuracy_message = None;
        let mut calculator = None;
        if let Some(correction) = correction {
            stage.set(Stage::Correcting);
            match correction {
                Ok(c) => calculator = Some(DistanceCalculator::accurate(c)),
                Err(e) if self.params.require_high_accuracy => return Err(e.into()),
                Err(e) => {
                    log::warn!("falling back to jack scale: {e}");
                    accuracy_message = Some(downgrade_message(&e));
                }
            }
        }

        // Computing
        stage.set(Stage::Computing);
        let fast = DistanceCalculator::fast(&jack.object, request.jack_diameter_mm)
            .map_err(|e| ProcessError::InvalidConfig(e.to_string()))?;
        let inv = 1.0 / working.scale;
        let mut measured = Vec::with_capacity(bowls.len());
        let mut using_high_accuracy = calculator.is_some();

        let accurate = match &calculator {
            Some(calc) => {
                let corrected: Result<Vec<_>, _> = bowls
                    .iter()
                    .zip(&teams)
                    .enumerate()
                    .map(|(i, (obj, team))| {
                        calc.measure(i as u32 + 1, &team.label, &jack.object, obj)
                    })
                    .collect();
                match corrected {
                    Ok(c) => Some(c),
                    Err(e) => {
                        if self.params.require_high_accuracy {
                            let DistanceError::UndefinedTransform { id } = &e else {
                                return Err(ProcessError::InvalidConfig(e.to_string()));
                            };
                            let bowl = &bowls[*id as usize - 1];
                            return Err(ProcessError::Metrology(
                                MetrologyError::UndefinedTransform {
                                    x: bowl.center_x * inv,
                                    y: bowl.center_y * inv,
                                },
                            ));
                        }
                        log::warn!("falling back to jack scale: {e}");
                        accuracy_message = Some(
                            "A bowl lies outside the corrected area, using jack size for scale."
                                .to_string(),
                        );
                        using_high_accuracy = false;
                        None
                    }
                }
            }
            None => None,
        };

        for (i, (obj, team)) in bowls.iter().zip(&teams).enumerate() {
            let id = i as u32 + 1;
            let distance = match &accurate {
                Some(corrected) => corrected[i].distance_cm,
                None => fast
                    .distance_cm(id, &jack.object, obj)
                    .map_err(|e| ProcessError::InvalidConfig(e.to_string()))?,
            };
            measured.push(BowlMeasurement {
                id,
                team_label: team.label.clone(),
                team: team.team,
                distance_from_jack: distance,
                rank: 0,
                x: obj.center_x * inv,
                y: obj.center_y * inv,
            });
        }

        // Assembling
        stage.set(Stage::Assembling);
        let jack_px = jack.object.scaled(inv);
        let meta = ResultMeta {
            image_ref: request.image_ref.clone(),
            image_width: Some(working.original_width),
            image_height: Some(working.original_height),
            using_high_accuracy,
            accuracy_message,
            jack: Some(JackPosition {
                x: jack_px.center_x,
                y: jack_px.center_y,
                radius: jack_px.radius(),
            }),
        };
        let result = ResultAssembler.assemble(measured, meta);
        stage.set(Stage::Done);
        log::info!(
            "measured {} bowls ({})",
            result.bowls.len(),
            if result.using_high_accuracy { "accurate" } else { "fast" }
        );
        Ok(result)
    }

    fn resolve_jack(
        &self,
        catalog: &ObjectCatalog,
        request: &MeasureRequest,
        working: &WorkingImage,
        max_aspect_ratio: f64,
    ) -> Result<Jack, ProcessError> {
        let params = JackSelectorParams {
            max_aspect_ratio,
            ..self.params.jack.clone()
        };
        if let Some((x, y)) = request.manual_jack {
            let s = working.scale;
            let jack = select_manual_jack(catalog, x * s, y * s, &params);
            return Ok(jack);
        }
        select_jack(catalog, &params)
            .and_then(|i| Jack::from_catalog(catalog, i))
            .ok_or(ProcessError::JackNotFound {
                candidates: catalog.len(),
                image_size: working.original_size(),
            })
    }
}

fn downgrade_message(e: &MetrologyError) -> String {
    match e {
        MetrologyError::MarkersIncomplete { missing } => format!(
            "Corner markers {missing:?} not found, using jack size for scale."
        ),
        _ => "Corner markers could not be used, using jack size for scale.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_cell_freezes_until_reset() {
        let cell = StageCell::default();
        cell.set(Stage::Detecting);
        assert_eq!(cell.get(), Stage::Detecting);
        cell.freeze(Stage::Failed);
        cell.set(Stage::Done);
        assert_eq!(cell.get(), Stage::Failed);
        cell.reset();
        assert_eq!(cell.get(), Stage::Idle);
    }

    #[test]
    fn cache_key_includes_options() {
        let mut req = MeasureRequest::new(Vec::new());
        assert_eq!(req.cache_key(), None);
        req.fingerprint = Some(Fingerprint::new("a.jpg", 5));
        assert_eq!(req.cache_key().as_deref(), Some("a.jpg@5|fast|63.5"));
        let req = req.with_high_accuracy(true).with_manual_jack(10.0, 20.0);
        assert_eq!(
            req.cache_key().as_deref(),
            Some("a.jpg@5|accurate|63.5|jack=10.0,20.0")
        );
    }

    #[test]
    fn cache_key_changes_with_settings_and_params() {
        let mut req = MeasureRequest::new(Vec::new());
        req.fingerprint = Some(Fingerprint::new("a.jpg", 5));
        let pipeline = Pipeline::default();
        let plain = SettingsSnapshot::default();

        let key = pipeline.cache_key(&req, &plain).expect("key");
        assert!(key.starts_with("a.jpg@5|fast|63.5|cfg="), "{key}");
        assert_eq!(pipeline.cache_key(&req, &plain), Some(key.clone()));

        let mut calibrated = plain.clone();
        calibrated.teams.team_a_name = Some("Home".into());
        assert_ne!(pipeline.cache_key(&req, &calibrated), Some(key.clone()));

        let mut blurred = plain.clone();
        blurred.detection.blur_kernel_size = 7;
        assert_ne!(pipeline.cache_key(&req, &blurred), Some(key.clone()));

        let smaller = Pipeline::new(PipelineParams {
            max_dimension: 800,
            ..PipelineParams::default()
        });
        assert_ne!(smaller.cache_key(&req, &plain), Some(key));

        req.fingerprint = None;
        assert_eq!(pipeline.cache_key(&req, &plain), None);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = Pipeline::default()
            .run(
                &MeasureRequest::new(b"not an image".to_vec()),
                &SettingsSnapshot::default(),
                &StageCell::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ProcessError::DecodeFailure(_)));
    }

    #[test]
    fn invalid_diameter_is_rejected_before_decoding() {
        let err = Pipeline::default()
            .run(
                &MeasureRequest::new(Vec::new()).with_jack_diameter(0.0),
                &SettingsSnapshot::default(),
                &StageCell::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidConfig(_)));
    }
}
