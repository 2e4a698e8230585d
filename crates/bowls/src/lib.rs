//! High-level facade crate for the `bowls-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying crates (`core`, `catalog`, `fiducial`, `measure`)
//! - [`Pipeline`]: synchronous measurement from compressed image bytes
//! - [`Orchestrator`]: async single-flight processing with timeout and a
//!   fingerprint-keyed [`ResultCache`]
//! - the `bowls` command-line tool (feature `cli`)
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use bowls::{MeasureRequest, MemorySettings, Orchestrator, Pipeline};
//!
//! # async fn run() -> std::io::Result<()> {
//! let orchestrator = Orchestrator::new(Pipeline::default(), Arc::new(MemorySettings::new()));
//! let request = MeasureRequest::from_path("end.jpg")?.with_high_accuracy(true);
//! let outcome = orchestrator.process(request).await;
//! if let Some(result) = outcome.result {
//!     for bowl in &result.bowls {
//!         println!("#{} {} {:.1} cm", bowl.rank, bowl.team_label, bowl.distance_from_jack);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `bowls::core`: colors, detected objects, detection config, homography.
//! - `bowls::catalog`: blob-based object catalog from RGB images.
//! - `bowls::fiducial`: corner-marker dictionaries, decoding and detection.
//! - `bowls::measure`: jack selection, exclusion, teams, metrology, distances.

pub use bowls_catalog as catalog;
pub use bowls_core as core;
pub use bowls_fiducial as fiducial;
pub use bowls_measure as measure;

mod cache;
mod error;
pub mod io;
mod orchestrator;
mod pipeline;
mod settings;

pub use bowls_measure::{BowlMeasurement, MeasurementResult, Team};
pub use cache::{
    CacheEntry, CacheError, CachePolicy, CacheStore, EvictionReport, Fingerprint, FsCacheStore,
    MemoryCacheStore, ResultCache,
};
pub use error::{ErrorKind, ProcessError};
pub use io::{MeasureConfig, MeasureIoError};
pub use orchestrator::{Orchestrator, OrchestratorConfig, ProcessingOutcome};
pub use pipeline::{MeasureRequest, Pipeline, PipelineParams, Stage, StageCell};
pub use settings::{
    load_snapshot, MemorySettings, SettingsSnapshot, SettingsStore, KEY_DETECTION_CONFIG,
    KEY_TEAM_A_COLOR, KEY_TEAM_A_NAME, KEY_TEAM_B_COLOR, KEY_TEAM_B_NAME,
};
