use crate::metrics::Surface;
use crate::pipeline::{DetectResponse, ImageInput, run_detection};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use serde::Serialize;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One reply per image frame, in arrival order.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    tracing::info!("Stream client connected");
    let mut frames = 0u64;

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(Message::Close(_)) => break,
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Stream receive failed");
                break;
            }
        };

        let Some(packet) = handle_frame(&state, message).await else {
            continue;
        };

        if socket.send(Message::Binary(packet)).await.is_err() {
            break;
        }
        frames += 1;
    }

    tracing::info!(frames, "Stream client disconnected");
}

/// Reply packet for one incoming message, or `None` when the message carries
/// no image (ping, pong, close).
///
/// Binary messages carry encoded image bytes; text messages are treated as
/// base64. A failed detection still yields a packet: the error body with no
/// image attached.
pub async fn handle_frame(state: &AppState, message: Message) -> Option<Vec<u8>> {
    let input = match message {
        Message::Binary(data) => ImageInput::Encoded(Bytes::from(data)),
        Message::Text(text) => ImageInput::Base64(text),
        _ => return None,
    };

    let packet = match run_detection(state, Surface::Stream, input, true).await {
        Ok(outcome) => {
            let jpeg = outcome.overlay.unwrap_or_default();
            frame_packet(&DetectResponse::metadata(outcome.frame), &jpeg)
        }
        Err(e) => frame_packet(&e.body(), &[]),
    };

    match packet {
        Ok(packet) => Some(packet),
        Err(e) => {
            tracing::error!(error = %e, "JSON serialization error");
            None
        }
    }
}

/// `u32 LE json length | json | jpeg`
pub fn frame_packet(metadata: &impl Serialize, jpeg: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(metadata)?;

    let mut binary_msg = Vec::with_capacity(4 + json.len() + jpeg.len());
    binary_msg.extend_from_slice(&(json.len() as u32).to_le_bytes());
    binary_msg.extend_from_slice(&json);
    binary_msg.extend_from_slice(jpeg);

    Ok(binary_msg)
}
