use std::sync::Arc;

use analysis_engine::{AnalysisService, GameReviewResult};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::clients::lichess::LichessClient;
use crate::error::AppError;

#[derive(Deserialize)]
pub struct AnalyzeGameRequest {
    pub pgn: Option<String>,
    pub lichess_url: Option<String>,
}

/// POST /api/games/analyze
pub async fn analyze_game(
    Extension(service): Extension<Arc<AnalysisService>>,
    Extension(lichess): Extension<Arc<LichessClient>>,
    Json(req): Json<AnalyzeGameRequest>,
) -> Result<Json<GameReviewResult>, AppError> {
    let url = req.lichess_url.filter(|u| !u.trim().is_empty());
    let pgn = req.pgn.filter(|p| !p.trim().is_empty());

    let pgn = match (url, pgn) {
        (Some(url), _) => {
            tracing::info!(url = %url, "Fetching game from Lichess");
            lichess.fetch_game_pgn(&url).await?
        }
        (None, Some(pgn)) => pgn,
        (None, None) => return Err(AppError::MissingGame),
    };

    let review = service.analyze_game(&pgn).await?;
    Ok(Json(review))
}
