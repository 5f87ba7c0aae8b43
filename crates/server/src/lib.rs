pub mod clients;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use analysis_engine::AnalysisService;
use axum::{routing::{get, post}, Extension, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::clients::lichess::LichessClient;

/// Build the HTTP router around an analysis service and a game-fetch client.
pub fn app(service: Arc<AnalysisService>, lichess: Arc<LichessClient>) -> Router {
    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Analysis
        .route("/api/analysis/position", post(routes::analysis::analyze_position))
        .route("/api/analysis/batch", post(routes::analysis::analyze_batch))
        // Games
        .route("/api/games/analyze", post(routes::games::analyze_game))
        // Shared state
        .layer(Extension(service))
        .layer(Extension(lichess))
        .layer(cors)
}
