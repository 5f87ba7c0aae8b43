use analysis_engine::AnalysisError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::clients::lichess::FetchError;

/// Everything a handler can reject a request with. All of it is the
/// caller's problem, so every variant answers 400.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("PGN or Lichess URL required")]
    MissingGame,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Fetch(FetchError::Http(msg)) => tracing::warn!("Lichess fetch failed: {msg}"),
            AppError::Fetch(e) => tracing::info!("Game fetch rejected: {e}"),
            AppError::Analysis(e) => tracing::debug!("Rejected analysis input: {e}"),
            AppError::MissingGame => {}
        }

        (StatusCode::BAD_REQUEST, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
