use axum::{Extension, Json};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use analysis_engine::AnalysisService;

/// GET /health
pub async fn health_check(Extension(service): Extension<Arc<AnalysisService>>) -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "cache": service.resolver().cache().is_enabled(),
    }))
}
