use crate::server::SharedState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

/// Serves the demo page from disk as-is.
pub async fn index(State(state): State<SharedState>) -> Response {
    match tokio::fs::read_to_string(&state.assets.index_file).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            tracing::error!("Failed to read index page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "index page unavailable").into_response()
        }
    }
}
