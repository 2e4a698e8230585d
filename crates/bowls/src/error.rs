//! Error taxonomy of a processing call.

use std::time::Duration;

use bowls_core::ConfigError;
use bowls_measure::MetrologyError;
use serde::{Deserialize, Serialize};

/// Failures of one processing call.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("image could not be decoded: {0}")]
    DecodeFailure(String),
    /// `image_size` is the decoded (original) width and height.
    #[error("no jack among {candidates} detected objects")]
    JackNotFound {
        candidates: usize,
        image_size: (u32, u32),
    },
    #[error("no objects detected")]
    NoObjectsDetected { image_size: (u32, u32) },
    /// Only surfaced when high accuracy is required; otherwise the run
    /// downgrades to jack-scale distances.
    #[error(transparent)]
    Metrology(#[from] MetrologyError),
    #[error("processing exceeded {0:?}")]
    Timeout(Duration),
    #[error("another measurement is in progress")]
    Busy,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("measurement worker failed: {0}")]
    Worker(String),
}

impl From<ConfigError> for ProcessError {
    fn from(e: ConfigError) -> Self {
        ProcessError::InvalidConfig(e.to_string())
    }
}

/// Machine-readable error kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DecodeFailure,
    JackNotFound,
    NoObjectsDetected,
    MarkersIncomplete,
    /// Markers were found but gave no usable perspective transform.
    PerspectiveFailure,
    Timeout,
    Busy,
    InvalidConfig,
    Worker,
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::DecodeFailure(_) => ErrorKind::DecodeFailure,
            ProcessError::JackNotFound { .. } => ErrorKind::JackNotFound,
            ProcessError::NoObjectsDetected { .. } => ErrorKind::NoObjectsDetected,
            ProcessError::Metrology(MetrologyError::MarkersIncomplete { .. }) => {
                ErrorKind::MarkersIncomplete
            }
            ProcessError::Metrology(_) => ErrorKind::PerspectiveFailure,
            ProcessError::Timeout(_) => ErrorKind::Timeout,
            ProcessError::Busy => ErrorKind::Busy,
            ProcessError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ProcessError::Worker(_) => ErrorKind::Worker,
        }
    }

    /// Text for the person holding the phone.
    pub fn user_message(&self) -> String {
        match self {
            ProcessError::DecodeFailure(_) => {
                "The photo could not be read. Please take it again.".to_string()
            }
            ProcessError::JackNotFound { .. } => {
                "The jack could not be found. Mark it by hand to continue.".to_string()
            }
            ProcessError::NoObjectsDetected { .. } => {
                "No jack or bowls were found in the photo.".to_string()
            }
            ProcessError::Metrology(MetrologyError::MarkersIncomplete { missing }) => format!(
                "Corner markers {missing:?} are not visible, high accuracy is unavailable."
            ),
            ProcessError::Metrology(_) => {
                "The corner markers could not be used for high accuracy.".to_string()
            }
            ProcessError::Timeout(_) => "Measuring took too long. Please try again.".to_string(),
            ProcessError::Busy => "A measurement is already running.".to_string(),
            ProcessError::InvalidConfig(msg) => {
                format!("The measurement settings are invalid: {msg}")
            }
            ProcessError::Worker(_) => "The measurement failed unexpectedly.".to_string(),
        }
    }

    /// Whether the caller still receives a displayable result (raw image,
    /// no bowls) alongside this error.
    pub fn has_fallback_artifact(&self) -> bool {
        matches!(
            self,
            ProcessError::DecodeFailure(_)
                | ProcessError::JackNotFound { .. }
                | ProcessError::NoObjectsDetected { .. }
        )
    }

    /// Original image size, when the image was decoded before failing.
    pub fn image_size(&self) -> Option<(u32, u32)> {
        match self {
            ProcessError::JackNotFound { image_size, .. }
            | ProcessError::NoObjectsDetected { image_size } => Some(*image_size),
            _ => None,
        }
    }
}
