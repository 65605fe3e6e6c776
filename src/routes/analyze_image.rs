use crate::{codec, codec::STREAM_JPEG_QUALITY, server::SharedState};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum AnalyzeImageError {
    #[error("could not read the uploaded image: {0}")]
    UnreadableImage(String),
    #[error("{0}")]
    Processing(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AnalyzeImageError {
    fn into_response(self) -> Response {
        let status = match self {
            AnalyzeImageError::UnreadableImage(_) => StatusCode::BAD_REQUEST,
            AnalyzeImageError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
pub struct AnalyzeImageResponse {
    pub annotated_image_base64: Option<String>,
}

#[instrument(skip(state, multipart))]
pub async fn analyze_image(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeImageResponse>, AnalyzeImageError> {
    let started = Instant::now();

    let mut image_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AnalyzeImageError::UnreadableImage(e.to_string()))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| AnalyzeImageError::UnreadableImage(e.to_string()))?;
            image_bytes = Some(data);
            break;
        }
    }

    let image_bytes = image_bytes.ok_or_else(|| {
        AnalyzeImageError::UnreadableImage("no `file` field in the upload".to_string())
    })?;

    let frame = codec::decode_image(&image_bytes)
        .map_err(|e| AnalyzeImageError::UnreadableImage(e.to_string()))?;

    let detector = state.detector.clone();
    let annotated = tokio::task::spawn_blocking(move || detector.detect_and_annotate(&frame))
        .await
        .map_err(|e| AnalyzeImageError::Processing(e.to_string()))?
        .map_err(|e| AnalyzeImageError::Processing(e.to_string()))?;

    let annotated_image_base64 = codec::encode_image_base64(&annotated, STREAM_JPEG_QUALITY)
        .map_err(|e| AnalyzeImageError::Processing(e.to_string()))?;

    state.metrics.record_request("/analyze_image/");
    state
        .metrics
        .record_inference_duration(started.elapsed().as_millis() as u64, "/analyze_image/");

    Ok(Json(AnalyzeImageResponse {
        annotated_image_base64: Some(annotated_image_base64),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{shared_state, StubDescriber, StubDetector};
    use crate::config::AssetsConfig;
    use crate::routes::api_routes;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "test-boundary";

    fn multipart_body(field_name: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field_name}\"; \
                 filename=\"frame.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn test_router() -> axum::Router {
        let assets = AssetsConfig {
            static_dir: "static".into(),
            index_file: "static/index.html".into(),
        };
        let state = shared_state(
            Arc::new(StubDetector::new()),
            Arc::new(StubDescriber { fail: false }),
        );
        axum::Router::new()
            .merge(api_routes(&assets))
            .with_state(state)
    }

    fn upload_request(field_name: &str, payload: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze_image/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field_name, payload)))
            .unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::ImageBuffer::from_pixel(32, 24, image::Rgb([120u8, 60, 30]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn non_image_upload_is_a_client_error() {
        let response = test_router()
            .oneshot(upload_request("file", b"this is not an image"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("could not read the uploaded image"));
    }

    #[tokio::test]
    async fn missing_file_field_is_a_client_error() {
        let response = test_router()
            .oneshot(upload_request("other", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_upload_returns_annotated_base64() {
        let response = test_router()
            .oneshot(upload_request("file", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let encoded = json["annotated_image_base64"].as_str().unwrap();

        let annotated = crate::codec::decode_base64_image(encoded).unwrap();
        assert_eq!(image::GenericImageView::dimensions(&annotated), (32, 24));
    }

    #[tokio::test]
    async fn detector_failure_is_a_server_error() {
        let assets = AssetsConfig {
            static_dir: "static".into(),
            index_file: "static/index.html".into(),
        };
        let state = shared_state(
            Arc::new(StubDetector::failing()),
            Arc::new(StubDescriber { fail: false }),
        );
        let router = axum::Router::new()
            .merge(api_routes(&assets))
            .with_state(state);

        let response = router
            .oneshot(upload_request("file", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
