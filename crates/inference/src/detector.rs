use crate::{
    backend::InferenceBackend,
    config::DetectorConfig,
    error::{InferenceError, LoadError, panic_message},
    processing::{post::PostProcessor, pre::PreProcessor},
};
use growth::RawDetection;
use image::DynamicImage;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// A loaded model that turns one image into raw detections.
///
/// Shared behind an `Arc` by every request, so `infer` takes `&self`.
pub trait Detector: Send + Sync {
    fn infer(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, InferenceError>;
}

/// Run `detector` on `image`, turning a panic inside the model call into
/// [`InferenceError::Panicked`].
pub fn infer_guarded(
    detector: &dyn Detector,
    image: &DynamicImage,
) -> Result<Vec<RawDetection>, InferenceError> {
    panic::catch_unwind(AssertUnwindSafe(|| detector.infer(image))).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(panic = %message, "Detector panicked during inference");
        Err(InferenceError::Panicked(message))
    })
}

/// Produces a ready [`Detector`]. Invoked at most once per load attempt.
pub trait DetectorLoader: Send + Sync + 'static {
    fn load(&self) -> Result<Arc<dyn Detector>, LoadError>;
}

impl<F> DetectorLoader for F
where
    F: Fn() -> Result<Arc<dyn Detector>, LoadError> + Send + Sync + 'static,
{
    fn load(&self) -> Result<Arc<dyn Detector>, LoadError> {
        self()
    }
}

/// YOLOv5 pipeline: letterbox, run the backend, decode and NMS.
pub struct YoloDetector<B: InferenceBackend> {
    backend: Mutex<B>,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
}

impl<B: InferenceBackend> YoloDetector<B> {
    pub fn new(backend: B, config: &DetectorConfig) -> Self {
        Self {
            backend: Mutex::new(backend),
            preprocessor: PreProcessor::new(config.input_size),
            postprocessor: PostProcessor::new(
                config.confidence_threshold,
                config.iou_threshold,
                config.max_detections,
                config.class_names.clone(),
            ),
        }
    }
}

impl<B: InferenceBackend> Detector for YoloDetector<B> {
    fn infer(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, InferenceError> {
        let span = tracing::info_span!(
            "model_inference",
            width = image.width(),
            height = image.height()
        );
        let _enter = span.enter();

        let (input, transform) = self.preprocessor.preprocess(image)?;

        let output = {
            let _s = tracing::debug_span!("backend_infer").entered();
            // A panic mid-run leaves the session itself usable.
            let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
            backend.infer(&input).map_err(InferenceError::backend)?
        };

        let _s = tracing::debug_span!("postprocess").entered();
        self.postprocessor
            .parse_detections(&output.predictions.view(), &transform)
    }
}

/// Loads a [`YoloDetector`] over backend `B` from a [`DetectorConfig`].
pub struct BackendLoader<B> {
    config: DetectorConfig,
    _backend: PhantomData<fn() -> B>,
}

impl<B: InferenceBackend> BackendLoader<B> {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            _backend: PhantomData,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl<B: InferenceBackend> DetectorLoader for BackendLoader<B> {
    fn load(&self) -> Result<Arc<dyn Detector>, LoadError> {
        let path = &self.config.model_path;
        if !path.exists() {
            return Err(LoadError::ModelNotFound(path.display().to_string()));
        }

        tracing::info!(path = %path.display(), device = ?self.config.device, "Loading detector");

        let backend =
            B::load_model(&self.config).map_err(|e| LoadError::Backend(format!("{e:#}")))?;

        Ok(Arc::new(YoloDetector::new(backend, &self.config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InferenceOutput;
    use image::{Rgb, RgbImage};
    use ndarray::{Array, IxDyn};
    use std::path::PathBuf;

    /// Always reports one Muda box centered in the 640x640 input.
    struct FakeBackend;

    impl InferenceBackend for FakeBackend {
        fn load_model(_config: &DetectorConfig) -> anyhow::Result<Self> {
            Ok(FakeBackend)
        }

        fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
            anyhow::ensure!(images.shape() == [1, 3, 640, 640], "bad input shape");
            let row = vec![320.0, 320.0, 64.0, 64.0, 0.9, 0.05, 0.95, 0.0];
            Ok(InferenceOutput {
                predictions: Array::from_shape_vec(IxDyn(&[1, 1, 8]), row)?,
            })
        }
    }

    struct BrokenBackend;

    impl InferenceBackend for BrokenBackend {
        fn load_model(_config: &DetectorConfig) -> anyhow::Result<Self> {
            Err(anyhow::anyhow!("invalid protobuf").context("commit_from_file"))
        }

        fn infer(&mut self, _images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
            unreachable!()
        }
    }

    fn config_with_existing_model() -> DetectorConfig {
        DetectorConfig {
            // Any existing file passes the presence check.
            model_path: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"),
            ..DetectorConfig::test_default()
        }
    }

    #[test]
    fn test_yolo_detector_maps_boxes_to_original_image() {
        let detector = YoloDetector::new(FakeBackend, &DetectorConfig::test_default());
        // 1280x1280 -> scale 0.5, no padding
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1280, 1280, Rgb([10, 20, 30])));

        let dets = detector.infer(&image).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "Muda");
        assert_eq!(dets[0].bbox, growth::BoundingBox::new(576, 576, 704, 704));
    }

    #[test]
    fn test_missing_model_is_reported() {
        let loader = BackendLoader::<FakeBackend>::new(DetectorConfig {
            model_path: PathBuf::from("/nonexistent/best.onnx"),
            ..DetectorConfig::test_default()
        });
        match loader.load() {
            Err(LoadError::ModelNotFound(path)) => assert_eq!(path, "/nonexistent/best.onnx"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn test_backend_failure_keeps_context() {
        let loader = BackendLoader::<BrokenBackend>::new(config_with_existing_model());
        match loader.load() {
            Err(LoadError::Backend(msg)) => assert_eq!(msg, "commit_from_file: invalid protobuf"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn test_backend_loader_builds_detector() {
        let loader = BackendLoader::<FakeBackend>::new(config_with_existing_model());
        let detector = loader.load().unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::new(640, 640));
        assert_eq!(detector.infer(&image).unwrap().len(), 1);
    }

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn infer(&self, _image: &DynamicImage) -> Result<Vec<RawDetection>, InferenceError> {
            panic!("session crashed")
        }
    }

    #[test]
    fn test_infer_guarded_converts_panic() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        assert_eq!(
            infer_guarded(&PanickingDetector, &image),
            Err(InferenceError::Panicked("session crashed".to_string()))
        );
    }

    #[test]
    fn test_infer_guarded_passes_results_through() {
        let detector = YoloDetector::new(FakeBackend, &DetectorConfig::test_default());
        let image = DynamicImage::ImageRgb8(RgbImage::new(640, 640));
        assert_eq!(infer_guarded(&detector, &image).unwrap().len(), 1);
    }

    #[test]
    fn test_closure_is_a_loader() {
        let loader = || -> Result<Arc<dyn Detector>, LoadError> {
            Err(LoadError::Backend("nope".into()))
        };
        assert_eq!(
            DetectorLoader::load(&loader).err(),
            Some(LoadError::Backend("nope".into()))
        );
    }
}
