use crate::server::SharedState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Deserialize)]
pub struct AiAnalysisRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Serialize)]
pub struct AiAnalysisResponse {
    pub response: String,
}

#[instrument(skip(state, request))]
pub async fn analyze_with_ai(
    State(state): State<SharedState>,
    Json(request): Json<AiAnalysisRequest>,
) -> Response {
    let image = request.image.filter(|s| !s.is_empty());
    let prompt = request.prompt.filter(|s| !s.is_empty());

    let (Some(image), Some(prompt)) = (image, prompt) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(AiAnalysisResponse {
                response: "Missing image or prompt data.".to_string(),
            }),
        )
            .into_response();
    };

    match state.describer.describe(&image, &prompt).await {
        Ok(text) => {
            state.metrics.record_request("/analyze_with_ai/");
            Json(AiAnalysisResponse { response: text }).into_response()
        }
        Err(e) => {
            tracing::error!("Description service call failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AiAnalysisResponse {
                    response: "AI service error.".to_string(),
                }),
            )
                .into_response()
        }
    }
}
