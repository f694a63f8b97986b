use crate::error::DecodeError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::DynamicImage;

/// Drop a `data:image/...;base64,` prefix if present.
pub fn strip_data_url(payload: &str) -> &str {
    let payload = payload.trim();
    match payload.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(rest, |(_, data)| data),
        None => payload,
    }
}

/// Decode an inline base64 image, with or without a data-URL prefix.
///
/// Line-wrapped (MIME style) payloads are accepted.
pub fn decode_base64_image(payload: &str) -> Result<DynamicImage, DecodeError> {
    let data: Vec<u8> = strip_data_url(payload)
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = STANDARD
        .decode(&data)
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    decode_image_bytes(&bytes)
}

/// Decode raw encoded image bytes (JPEG, PNG, WebP, BMP).
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let image = image::load_from_memory(bytes).map_err(|e| DecodeError::Image(e.to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::Empty);
    }

    tracing::trace!(width = image.width(), height = image.height(), "Decoded image");
    Ok(image)
}
