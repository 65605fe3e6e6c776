use crate::{codec, codec::STREAM_JPEG_QUALITY, detector::Detector, server::SharedState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Wire format for both directions of the stream: one base64 frame per
/// message. Parsed with a schema-aware decode; the payload is
/// attacker-controlled and must never be evaluated.
#[derive(Serialize, Deserialize)]
struct FramePayload {
    image: String,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One loop iteration per inbound frame: receive, process, reply. A frame
/// that fails anywhere between parsing and encoding is dropped without a
/// reply and without ending the session; only transport-level failures
/// close the loop.
async fn handle_socket(mut socket: WebSocket, state: SharedState) {
    tracing::info!("WebSocket connection established");
    state.metrics.session_opened();

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::info!("WebSocket transport error: {}", e);
                break;
            }
        };

        let raw = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let started = Instant::now();
        let detector = state.detector.clone();
        let reply = match tokio::task::spawn_blocking(move || {
            process_frame(detector.as_ref(), raw.as_str())
        })
        .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Frame processing task failed: {}", e);
                continue;
            }
        };

        let Some(reply) = reply else {
            continue;
        };

        state.metrics.record_frame("/ws");
        state
            .metrics
            .record_inference_duration(started.elapsed().as_millis() as u64, "/ws");

        if socket.send(Message::Text(reply.into())).await.is_err() {
            tracing::info!("WebSocket client disconnected");
            break;
        }
    }

    state.metrics.session_closed();
    tracing::info!("WebSocket connection closed");
}

/// Runs one frame through parse → decode → detect → encode. Returns the
/// reply payload, or `None` when the frame is dropped; every drop is
/// logged with its cause.
fn process_frame(detector: &dyn Detector, raw: &str) -> Option<String> {
    let payload: FramePayload = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Discarding malformed frame payload: {}", e);
            return None;
        }
    };

    let frame = match codec::decode_base64_image(&payload.image) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Discarding undecodable frame: {}", e);
            return None;
        }
    };

    let annotated = match detector.detect_and_annotate(&frame) {
        Ok(annotated) => annotated,
        Err(e) => {
            tracing::warn!("Detection failed, skipping frame: {}", e);
            return None;
        }
    };

    let image = match codec::encode_image_base64(&annotated, STREAM_JPEG_QUALITY) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!("Failed to encode annotated frame: {}", e);
            return None;
        }
    };

    match serde_json::to_string(&FramePayload { image }) {
        Ok(reply) => Some(reply),
        Err(e) => {
            tracing::warn!("Failed to serialize frame reply: {}", e);
            None
        }
    }
}
