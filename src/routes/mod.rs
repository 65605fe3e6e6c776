mod analyze_image;
mod analyze_with_ai;
mod health;
mod index;
mod metrics;
mod ws;

use crate::config::AssetsConfig;
use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

pub fn api_routes(assets: &AssetsConfig) -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route("/health_check", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/analyze_image/", post(analyze_image::analyze_image))
        .route("/analyze_with_ai/", post(analyze_with_ai::analyze_with_ai))
        .route("/ws", get(ws::ws_handler))
        .nest_service("/static", ServeDir::new(&assets.static_dir))
}
