//! Caller-facing analysis service.
//!
//! Owns the resolver and its sources. Input is validated here; nothing past
//! this point fails the caller.

use std::sync::Arc;

use chess_core::pgn::parse_moves;
use chess_core::position::{parse_fen, to_fen};
use tracing::info;

use crate::cache::EvalCache;
use crate::cloud::LichessCloudClient;
use crate::config::{AnalysisConfig, MAX_BATCH_SIZE};
use crate::error::AnalysisError;
use crate::evaluation::AnalysisResult;
use crate::resolver::Resolver;
use crate::review::{review_game, GameReviewResult};
use crate::stockfish::StockfishEvaluator;

const MAX_DEPTH: u32 = 40;
const MAX_MULTI_PV: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub analysis_depth: u32,
    pub review_depth: u32,
}

impl From<&AnalysisConfig> for ServiceSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            analysis_depth: config.analysis_depth,
            review_depth: config.review_depth,
        }
    }
}

pub struct AnalysisService {
    resolver: Resolver,
    settings: ServiceSettings,
}

impl AnalysisService {
    pub fn new(resolver: Resolver, settings: ServiceSettings) -> Self {
        Self { resolver, settings }
    }

    /// Wire up the cache store, cloud client and engine named in `config`.
    /// Missing engine or cache degrade the chain; they do not fail here.
    pub async fn from_config(config: &AnalysisConfig) -> anyhow::Result<Self> {
        let cache = EvalCache::connect(config.cache_url.as_deref(), config.cache_ttl).await;
        let cloud = LichessCloudClient::new(config.cloud_eval_url.clone(), config.cloud_timeout)?;
        let engine = StockfishEvaluator::new(config.stockfish_path.clone(), config.engine_hash_mb);

        let resolver = Resolver::new(cache, Arc::new(cloud), Arc::new(engine))
            .with_move_time(config.engine_move_time)
            .with_batch_concurrency(config.batch_concurrency);

        info!(
            cache = resolver.cache().is_enabled(),
            engine = config.stockfish_path.is_some(),
            "Analysis service ready"
        );
        Ok(Self::new(resolver, ServiceSettings::from(config)))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub async fn analyze_position(
        &self,
        fen: &str,
        depth: Option<u32>,
        multi_pv: Option<u32>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let fen = canonical_fen(fen)?;
        let depth = clamp_depth(depth.unwrap_or(self.settings.analysis_depth));
        let multi_pv = multi_pv.unwrap_or(1).clamp(1, MAX_MULTI_PV);
        Ok(self.resolver.resolve(&fen, multi_pv, depth).await)
    }

    /// Up to [`MAX_BATCH_SIZE`] positions, single line each, in input order.
    pub async fn analyze_batch(
        &self,
        fens: &[String],
        depth: Option<u32>,
    ) -> Result<Vec<AnalysisResult>, AnalysisError> {
        if fens.is_empty() {
            return Err(AnalysisError::InvalidBatch("no positions supplied".into()));
        }
        if fens.len() > MAX_BATCH_SIZE {
            return Err(AnalysisError::InvalidBatch(format!(
                "{} positions exceeds the limit of {MAX_BATCH_SIZE}",
                fens.len()
            )));
        }

        let fens = fens
            .iter()
            .map(|fen| canonical_fen(fen))
            .collect::<Result<Vec<_>, _>>()?;
        let depth = clamp_depth(depth.unwrap_or(self.settings.analysis_depth));
        Ok(self.resolver.resolve_batch(&fens, 1, depth).await)
    }

    pub async fn analyze_game(&self, move_text: &str) -> Result<GameReviewResult, AnalysisError> {
        let game = parse_moves(move_text)?;
        Ok(review_game(&self.resolver, &game, self.settings.review_depth).await)
    }

    /// Release the cache store handle.
    pub async fn shutdown(&self) {
        self.resolver.cache().close().await;
        info!("Analysis service shut down");
    }
}

fn canonical_fen(fen: &str) -> Result<String, AnalysisError> {
    parse_fen(fen)
        .map(|pos| to_fen(&pos))
        .map_err(AnalysisError::InvalidPosition)
}

fn clamp_depth(depth: u32) -> u32 {
    depth.clamp(1, MAX_DEPTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudEvaluator;
    use crate::error::EngineError;
    use crate::evaluation::{Evaluation, Provenance};
    use crate::stockfish::{PositionEvaluator, SearchLimits};
    use async_trait::async_trait;

    struct NoCloud;

    #[async_trait]
    impl CloudEvaluator for NoCloud {
        async fn lookup(&self, _fen: &str, _multi_pv: u32) -> Option<Evaluation> {
            None
        }
    }

    struct NoEngine;

    #[async_trait]
    impl PositionEvaluator for NoEngine {
        async fn evaluate(&self, _fen: &str, _limits: SearchLimits) -> Result<Evaluation, EngineError> {
            Err(EngineError::Unavailable("test".into()))
        }
    }

    fn service() -> AnalysisService {
        let resolver = Resolver::new(EvalCache::disabled(), Arc::new(NoCloud), Arc::new(NoEngine));
        AnalysisService::new(
            resolver,
            ServiceSettings {
                analysis_depth: 10,
                review_depth: 10,
            },
        )
    }

    #[tokio::test]
    async fn test_invalid_position_is_rejected() {
        let result = service().analyze_position("not a fen", None, None).await;
        assert!(matches!(result, Err(AnalysisError::InvalidPosition(_))));
    }

    #[tokio::test]
    async fn test_batch_bounds() {
        let svc = service();
        assert!(matches!(
            svc.analyze_batch(&[], None).await,
            Err(AnalysisError::InvalidBatch(_))
        ));

        let too_many = vec![chess_core::position::STANDARD_START_FEN.to_string(); MAX_BATCH_SIZE + 1];
        assert!(matches!(
            svc.analyze_batch(&too_many, None).await,
            Err(AnalysisError::InvalidBatch(_))
        ));

        let bad = vec!["garbage".to_string()];
        assert!(matches!(
            svc.analyze_batch(&bad, None).await,
            Err(AnalysisError::InvalidPosition(_))
        ));
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_none() {
        let result = service()
            .analyze_position(chess_core::position::STANDARD_START_FEN, Some(5), None)
            .await
            .unwrap();
        assert_eq!(result.source, Provenance::None);
        assert!(result.evaluation.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_move_text() {
        let svc = service();
        assert!(matches!(
            svc.analyze_game("").await,
            Err(AnalysisError::MoveText(_))
        ));
        assert!(matches!(
            svc.analyze_game("1. e4 Ke7 2. Qxf7").await,
            Err(AnalysisError::MoveText(_))
        ));
    }
}
