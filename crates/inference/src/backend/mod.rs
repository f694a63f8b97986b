use crate::config::DetectorConfig;
use ndarray::{Array, IxDyn};

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Runs the raw model graph. Pre- and postprocessing live in
/// [`crate::detector::YoloDetector`].
pub trait InferenceBackend: Send + 'static {
    fn load_model(config: &DetectorConfig) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a letterboxed `[1, 3, H, W]` input in 0-1 range.
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput>;
}

pub struct InferenceOutput {
    pub predictions: ndarray::ArrayD<f32>, // [1, N, 5 + num_classes] cx, cy, w, h, objectness, class scores
}
