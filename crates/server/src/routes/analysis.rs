use std::sync::Arc;

use analysis_engine::{AnalysisResult, AnalysisService};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Deserialize)]
pub struct PositionRequest {
    pub fen: String,
    pub depth: Option<u32>,
    pub multi_pv: Option<u32>,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub fens: Vec<String>,
    pub depth: Option<u32>,
}

/// POST /api/analysis/position
pub async fn analyze_position(
    Extension(service): Extension<Arc<AnalysisService>>,
    Json(req): Json<PositionRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    let result = service
        .analyze_position(&req.fen, req.depth, req.multi_pv)
        .await?;
    Ok(Json(result))
}

/// POST /api/analysis/batch
pub async fn analyze_batch(
    Extension(service): Extension<Arc<AnalysisService>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<Vec<AnalysisResult>>, AppError> {
    let results = service.analyze_batch(&req.fens, req.depth).await?;
    Ok(Json(results))
}
