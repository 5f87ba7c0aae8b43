//! Analysis error types

use std::time::Duration;

use thiserror::Error;

/// Failures of the engine subprocess adapter.
///
/// Every variant is absorbed by the resolver and treated as "try the next
/// source"; they differ only in what gets logged.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Evaluator unavailable: {0}")]
    Unavailable(String),

    #[error("No evaluation produced: {0}")]
    NoEvaluation(String),

    #[error("Engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("Engine protocol error: {0}")]
    Protocol(String),
}

/// Failures of the evaluation cache store. Never surfaced past the cache layer.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Input errors rejected before any evaluator is consulted.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error(transparent)]
    MoveText(#[from] chess_core::pgn::PgnError),
}
