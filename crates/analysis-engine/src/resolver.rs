//! Fallback resolver: cache, then cloud, then engine.
//!
//! `resolve` never fails. Sources that error or come back empty fall through
//! to the next one; when all of them do, the result carries provenance
//! `none` and an empty evaluation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::cache::EvalCache;
use crate::cloud::CloudEvaluator;
use crate::evaluation::{AnalysisResult, Evaluation, Provenance};
use crate::stockfish::{PositionEvaluator, SearchLimits};

#[derive(Clone)]
pub struct Resolver {
    cache: EvalCache,
    cloud: Arc<dyn CloudEvaluator>,
    engine: Arc<dyn PositionEvaluator>,
    move_time: Duration,
    batch_concurrency: usize,
}

impl Resolver {
    pub fn new(
        cache: EvalCache,
        cloud: Arc<dyn CloudEvaluator>,
        engine: Arc<dyn PositionEvaluator>,
    ) -> Self {
        Self {
            cache,
            cloud,
            engine,
            move_time: Duration::from_millis(3000),
            batch_concurrency: 5,
        }
    }

    pub fn with_move_time(mut self, move_time: Duration) -> Self {
        self.move_time = move_time;
        self
    }

    pub fn with_batch_concurrency(mut self, width: usize) -> Self {
        self.batch_concurrency = width.max(1);
        self
    }

    pub fn cache(&self) -> &EvalCache {
        &self.cache
    }

    /// Resolve one position through the fallback chain.
    pub async fn resolve(&self, fen: &str, multi_pv: u32, depth: u32) -> AnalysisResult {
        let started = Instant::now();
        let (source, evaluation) = self.first_available(fen, multi_pv, depth).await;

        AnalysisResult {
            source,
            position: fen.to_string(),
            depth: evaluation.depth,
            evaluation,
            time_taken: started.elapsed().as_secs_f64(),
        }
    }

    async fn first_available(&self, fen: &str, multi_pv: u32, depth: u32) -> (Provenance, Evaluation) {
        let started = Instant::now();

        if let Some(eval) = self.cache.get(fen, multi_pv).await {
            info!(fen, source = ?Provenance::Cache, elapsed_ms = elapsed_ms(started), "Resolved");
            return (Provenance::Cache, eval);
        }
        debug!(fen, "Cache miss");

        if let Some(eval) = self.cloud.lookup(fen, multi_pv).await {
            self.cache.put(fen, multi_pv, &eval).await;
            info!(fen, source = ?Provenance::Cloud, elapsed_ms = elapsed_ms(started), "Resolved");
            return (Provenance::Cloud, eval);
        }
        debug!(fen, "Cloud miss");

        let limits = SearchLimits {
            depth,
            move_time: self.move_time,
            multi_pv,
        };
        match self.engine.evaluate(fen, limits).await {
            Ok(eval) => {
                self.cache.put(fen, multi_pv, &eval).await;
                info!(
                    fen,
                    source = ?Provenance::Engine,
                    depth = ?eval.depth,
                    elapsed_ms = elapsed_ms(started),
                    "Resolved"
                );
                (Provenance::Engine, eval)
            }
            Err(e) => {
                warn!(fen, "Engine evaluation failed: {e}");
                error!(fen, "No evaluation source succeeded");
                (Provenance::None, Evaluation::empty(fen))
            }
        }
    }

    /// Resolve many positions with at most `batch_concurrency` in flight.
    ///
    /// Output follows input order. A task that dies is logged and left out.
    pub async fn resolve_batch(&self, fens: &[String], multi_pv: u32, depth: u32) -> Vec<AnalysisResult> {
        let semaphore = Arc::new(Semaphore::new(self.batch_concurrency));
        info!(
            positions = fens.len(),
            width = self.batch_concurrency,
            "Resolving batch"
        );

        let handles: Vec<_> = fens
            .iter()
            .map(|fen| {
                let resolver = self.clone();
                let permits = semaphore.clone();
                let fen = fen.clone();
                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok()?;
                    Some(resolver.resolve(&fen, multi_pv, depth).await)
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(fens)
            .filter_map(|(joined, fen)| match joined {
                Ok(Some(result)) => Some(result),
                Ok(None) => {
                    warn!(fen = %fen, "Batch semaphore closed; position skipped");
                    None
                }
                Err(e) => {
                    warn!(fen = %fen, "Batch evaluation task failed: {e}");
                    None
                }
            })
            .collect()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
