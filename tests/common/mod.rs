#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analysis_engine::cache::{EvalCache, MemoryEvalStore};
use analysis_engine::cloud::CloudEvaluator;
use analysis_engine::stockfish::{PositionEvaluator, SearchLimits};
use analysis_engine::{EngineError, Evaluation, PvLine, Resolver};
use async_trait::async_trait;
use chess_core::position::normalize_fen;

/// White-relative score and best move for one position.
pub fn eval(fen: &str, cp: i32, best: &str) -> Evaluation {
    Evaluation {
        fen: fen.to_string(),
        depth: Some(18),
        knodes: Some(1000),
        pvs: vec![PvLine {
            moves: best.to_string(),
            cp: Some(cp),
            mate: None,
        }],
    }
}

/// Answers from a table keyed on the first four FEN fields; counts every call.
#[derive(Default)]
pub struct ScriptedSource {
    table: HashMap<String, (i32, String)>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, fen: &str, cp: i32, best: &str) -> Self {
        self.table.insert(normalize_fen(fen), (cp, best.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent calls observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    async fn answer(&self, fen: &str) -> Option<Evaluation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(fen.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.table
            .get(&normalize_fen(fen))
            .map(|(cp, best)| eval(fen, *cp, best))
    }
}

#[async_trait]
impl CloudEvaluator for ScriptedSource {
    async fn lookup(&self, fen: &str, _multi_pv: u32) -> Option<Evaluation> {
        self.answer(fen).await
    }
}

#[async_trait]
impl PositionEvaluator for ScriptedSource {
    async fn evaluate(&self, fen: &str, _limits: SearchLimits) -> Result<Evaluation, EngineError> {
        self.answer(fen)
            .await
            .ok_or_else(|| EngineError::NoEvaluation(fen.to_string()))
    }
}

pub fn memory_cache() -> EvalCache {
    EvalCache::new(Arc::new(MemoryEvalStore::new()), Duration::from_secs(3600))
}

pub fn resolver(
    cache: EvalCache,
    cloud: Arc<ScriptedSource>,
    engine: Arc<ScriptedSource>,
) -> Resolver {
    Resolver::new(cache, cloud, engine).with_batch_concurrency(5)
}
