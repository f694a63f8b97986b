use crate::decode::{decode_base64_image, decode_image_bytes};
use crate::error::{DecodeError, DetectError};
use crate::metrics::Surface;
use crate::overlay::{encode_jpeg, render_overlay};
use crate::state::AppState;
use axum::body::Bytes;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use growth::{ProcessedDetection, ProcessedFrame, Summary};
use image::DynamicImage;
use inference::infer_guarded;
use serde::Serialize;
use std::time::Instant;

/// An image as it arrived on one of the surfaces.
#[derive(Debug, Clone)]
pub enum ImageInput {
    Base64(String),
    Encoded(Bytes),
}

impl ImageInput {
    pub fn decode(&self) -> Result<DynamicImage, DecodeError> {
        match self {
            ImageInput::Base64(payload) => decode_base64_image(payload),
            ImageInput::Encoded(bytes) => decode_image_bytes(bytes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub frame: ProcessedFrame,
    /// JPEG of the annotated image, when requested.
    pub overlay: Option<Vec<u8>>,
}

/// Success payload shared by the HTTP and stream surfaces.
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub detections: Vec<ProcessedDetection>,
    pub summary: Summary,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<String>,
}

impl DetectResponse {
    /// JSON body with the overlay inlined as base64.
    pub fn with_inline_overlay(outcome: DetectionOutcome) -> Self {
        let overlay = outcome.overlay.map(|jpeg| STANDARD.encode(jpeg));
        Self::new(outcome.frame, overlay)
    }

    /// JSON metadata only; the overlay travels separately.
    pub fn metadata(frame: ProcessedFrame) -> Self {
        Self::new(frame, None)
    }

    fn new(frame: ProcessedFrame, overlay: Option<String>) -> Self {
        let total = frame.total();
        Self {
            success: true,
            detections: frame.detections,
            summary: frame.summary,
            total,
            overlay,
        }
    }
}

/// Decode, make sure the detector is loaded, infer, classify, and optionally
/// render. Blocking: call from a blocking context.
///
/// Decoding happens first so a bad payload never touches the detector or
/// triggers a model load.
pub fn detect_blocking(
    state: &AppState,
    input: &ImageInput,
    with_overlay: bool,
) -> Result<DetectionOutcome, DetectError> {
    let image = input.decode()?;

    let detector = state.lifecycle.ensure_loaded()?;

    let start = Instant::now();
    let raw = infer_guarded(detector.as_ref(), &image)?;
    state.metrics.record_inference(start.elapsed().as_secs_f64());

    let frame = state.processor.process(&raw);
    state.metrics.record_detections(&frame.summary);

    tracing::debug!(
        width = image.width(),
        height = image.height(),
        detections = frame.total(),
        "Image processed"
    );

    let overlay = if with_overlay {
        let _s = tracing::debug_span!("render_overlay").entered();
        let annotated = render_overlay(&image, &frame, state.processor.catalog());
        let jpeg = encode_jpeg(&annotated)
            .map_err(|e| DetectError::Internal(format!("Failed to encode overlay: {e}")))?;
        Some(jpeg)
    } else {
        None
    };

    Ok(DetectionOutcome { frame, overlay })
}

/// Run [`detect_blocking`] on the blocking pool and record the outcome.
pub async fn run_detection(
    state: &AppState,
    surface: Surface,
    input: ImageInput,
    with_overlay: bool,
) -> Result<DetectionOutcome, DetectError> {
    let span = tracing::info_span!("detect", surface = surface.as_str());
    let task_state = state.clone();

    let result = tokio::task::spawn_blocking(move || {
        let _enter = span.enter();
        detect_blocking(&task_state, &input, with_overlay)
    })
    .await
    .unwrap_or_else(|e| {
        Err(DetectError::Internal(format!(
            "Detection task failed (task panicked or cancelled): {e}"
        )))
    });

    record_outcome(state, surface, &result);
    result
}

/// Count a request that was rejected before reaching the pipeline.
pub fn reject(state: &AppState, surface: Surface, err: DecodeError) -> DetectError {
    let err = DetectError::from(err);
    state.metrics.record_request(surface, err.kind());
    err
}

fn record_outcome<T>(state: &AppState, surface: Surface, result: &Result<T, DetectError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    state.metrics.record_request(surface, outcome);
}
