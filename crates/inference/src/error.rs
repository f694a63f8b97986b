use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// Why the shared detector is not available.
///
/// `Clone` so one failed attempt can be handed to every caller that waited
/// on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    Backend(String),

    #[error("Detector loader panicked: {0}")]
    Panicked(String),

    #[error("Timed out after {0:?} waiting for the detector to load")]
    Timeout(Duration),
}

/// Failure while running a loaded detector on one image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Model execution failed: {0}")]
    Backend(String),

    #[error("Unexpected model output: {0}")]
    InvalidOutput(String),

    #[error("Detector panicked: {0}")]
    Panicked(String),
}

impl InferenceError {
    pub(crate) fn backend(err: anyhow::Error) -> Self {
        InferenceError::Backend(format!("{err:#}"))
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
