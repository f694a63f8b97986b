use axum::extract::ws::Message;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use gateway::{AppState, GatewayConfig, ws::handle_frame};
use growth::RawDetection;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use inference::{Detector, DetectorLifecycle, InferenceError, LifecycleConfig, LoadError};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One Primordia box per 16 px of image width, so each frame's reply can be
/// told apart by its total.
struct WidthCountingDetector {
    calls: AtomicUsize,
}

impl Detector for WidthCountingDetector {
    fn infer(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (width, _) = image.dimensions();
        Ok((0..width / 16)
            .map(|i| {
                let x = (i * 16) as i32;
                RawDetection::new("primordia", 0.8, (x, 0, x + 8, 8))
            })
            .collect())
    }
}

fn stream_state() -> (AppState, Arc<WidthCountingDetector>) {
    let detector = Arc::new(WidthCountingDetector {
        calls: AtomicUsize::new(0),
    });
    let shared = Arc::clone(&detector);
    let lifecycle = DetectorLifecycle::new(
        move || -> Result<Arc<dyn Detector>, LoadError> { Ok(shared.clone() as Arc<dyn Detector>) },
        LifecycleConfig::default(),
    );
    (AppState::new(GatewayConfig::test_default(), lifecycle), detector)
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([120, 90, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Split a reply into its JSON metadata and trailing image bytes.
fn split_packet(packet: &[u8]) -> (Value, Vec<u8>) {
    let len = u32::from_le_bytes(packet[..4].try_into().unwrap()) as usize;
    let metadata = serde_json::from_slice(&packet[4..4 + len]).unwrap();
    (metadata, packet[4 + len..].to_vec())
}

#[tokio::test]
async fn test_binary_frame_returns_metadata_and_jpeg() {
    let (state, _detector) = stream_state();

    let packet = handle_frame(&state, Message::Binary(png(32, 24))).await.unwrap();
    let (metadata, jpeg) = split_packet(&packet);

    assert_eq!(metadata["success"], true);
    assert_eq!(metadata["total"], 2);
    assert_eq!(metadata["summary"]["Primordia"], 2);
    assert!(metadata.get("overlay").is_none());

    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let overlay = image::load_from_memory(&jpeg).unwrap();
    assert_eq!(overlay.dimensions(), (32, 24));
}

#[tokio::test]
async fn test_text_frame_is_decoded_as_base64() {
    let (state, _detector) = stream_state();
    let payload = format!("data:image/png;base64,{}", STANDARD.encode(png(48, 16)));

    let packet = handle_frame(&state, Message::Text(payload)).await.unwrap();
    let (metadata, jpeg) = split_packet(&packet);

    assert_eq!(metadata["success"], true);
    assert_eq!(metadata["total"], 3);
    assert!(!jpeg.is_empty());
}

#[tokio::test]
async fn test_corrupt_frame_replies_with_decode_error_and_stream_continues() {
    let (state, detector) = stream_state();

    let packet = handle_frame(&state, Message::Binary(b"not an image".to_vec()))
        .await
        .unwrap();
    let (metadata, jpeg) = split_packet(&packet);

    assert_eq!(metadata["success"], false);
    assert_eq!(metadata["error"], "DecodeError");
    assert!(jpeg.is_empty());
    assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.lifecycle.attempts(), 0);

    // The next frame on the same connection is still served.
    let packet = handle_frame(&state, Message::Binary(png(16, 16))).await.unwrap();
    let (metadata, _) = split_packet(&packet);
    assert_eq!(metadata["success"], true);
    assert_eq!(metadata["total"], 1);
}

#[tokio::test]
async fn test_replies_follow_arrival_order() {
    let (state, _detector) = stream_state();
    let widths = [64, 16, 48, 32];

    let mut totals = Vec::new();
    for width in widths {
        let packet = handle_frame(&state, Message::Binary(png(width, 8))).await.unwrap();
        let (metadata, _) = split_packet(&packet);
        totals.push(metadata["total"].as_u64().unwrap());
    }

    assert_eq!(totals, vec![4, 1, 3, 2]);
}

#[tokio::test]
async fn test_control_frames_get_no_reply() {
    let (state, detector) = stream_state();

    assert!(handle_frame(&state, Message::Ping(vec![1, 2])).await.is_none());
    assert!(handle_frame(&state, Message::Pong(Vec::new())).await.is_none());
    assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
}
