pub mod backend;
pub mod config;
pub mod detector;
pub mod error;
pub mod lifecycle;
pub mod processing;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::{DetectorConfig, Device, LifecycleConfig};
pub use detector::{BackendLoader, Detector, DetectorLoader, YoloDetector, infer_guarded};
pub use error::{InferenceError, LoadError};
pub use lifecycle::{DetectorLifecycle, LoadStatus};
