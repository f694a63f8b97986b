use crate::config::SERVICE_NAME;
use crate::error::{DecodeError, DetectError};
use crate::metrics::Surface;
use crate::pipeline::{DetectResponse, ImageInput, reject, run_detection};
use crate::state::AppState;
use crate::ws::ws_handler;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    routing::{get, post},
};
use inference::LoadStatus;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/detect", post(detect))
        .route("/detect/upload", post(detect_upload))
        .route("/ws/stream", get(ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub detail: String,
    pub model_loaded: bool,
    pub model_path: String,
    pub service: &'static str,
}

/// Always 200 and never waits on, or starts, a model load.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.lifecycle.status();

    let detail = match &status {
        LoadStatus::Uninitialized => "Model not loaded yet; it loads on the first detection".to_string(),
        LoadStatus::Loading => "Model is loading".to_string(),
        LoadStatus::Ready => "Model loaded".to_string(),
        LoadStatus::Failed(e) => format!("Model failed to load: {e}"),
    };

    Json(HealthResponse {
        status: status.as_str(),
        detail,
        model_loaded: status.is_ready(),
        model_path: state.config.detector.model_path.display().to_string(),
        service: SERVICE_NAME,
    })
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub image: Option<String>,
    #[serde(default, alias = "return_image")]
    pub return_overlay: bool,
}

async fn detect(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DetectResponse>, DetectError> {
    let request: DetectRequest = serde_json::from_slice(&body)
        .map_err(|e| reject(&state, Surface::Detect, DecodeError::InvalidBody(e.to_string())))?;

    let image = request
        .image
        .ok_or_else(|| reject(&state, Surface::Detect, DecodeError::Missing))?;

    let outcome = run_detection(
        &state,
        Surface::Detect,
        ImageInput::Base64(image),
        request.return_overlay,
    )
    .await?;

    Ok(Json(DetectResponse::with_inline_overlay(outcome)))
}

/// Multipart upload; the annotated image is always returned.
async fn detect_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, DetectError> {
    let bytes = match multipart {
        Ok(mut multipart) => read_image_field(&mut multipart).await,
        Err(rejection) => Err(DecodeError::InvalidBody(rejection.body_text())),
    }
    .map_err(|e| reject(&state, Surface::Upload, e))?;

    let outcome = run_detection(&state, Surface::Upload, ImageInput::Encoded(bytes), true).await?;

    Ok(Json(DetectResponse::with_inline_overlay(outcome)))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Bytes, DecodeError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DecodeError::InvalidBody(e.body_text()))?
    {
        if field.name() == Some("image") {
            return field
                .bytes()
                .await
                .map_err(|e| DecodeError::InvalidBody(e.body_text()));
        }
    }
    Err(DecodeError::Missing)
}
