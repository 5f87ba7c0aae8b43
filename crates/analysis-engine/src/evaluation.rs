//! Evaluation model shared by every source and by the cache.
//!
//! Scores are always White-relative: the cloud service reports them that way
//! and the engine adapter flips its side-to-move scores before building an
//! [`Evaluation`]. Consumers that need the mover's point of view convert with
//! [`chess_core::Side::perspective`].

use serde::{Deserialize, Serialize};

/// Centipawn sentinel standing in for a forced mate.
pub const MATE_SCORE: i32 = 30_000;

/// Which source produced an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Cache,
    Cloud,
    Engine,
    /// Every source failed
    None,
}

/// One principal variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvLine {
    /// Space-separated UCI moves
    pub moves: String,
    /// Centipawns, White-relative
    #[serde(default)]
    pub cp: Option<i32>,
    /// Mate in N, positive when White mates
    #[serde(default)]
    pub mate: Option<i32>,
}

impl PvLine {
    /// Centipawn score with mates mapped onto the sentinel.
    pub fn score_cp(&self) -> Option<i32> {
        self.cp.or_else(|| self.mate.map(mate_to_cp))
    }

    pub fn first_move(&self) -> Option<&str> {
        self.moves.split_whitespace().next()
    }
}

/// Map a White-relative mate distance to the centipawn sentinel.
pub fn mate_to_cp(mate: i32) -> i32 {
    if mate > 0 {
        MATE_SCORE
    } else {
        -MATE_SCORE
    }
}

/// Analysis of one position, in the cloud service's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub fen: String,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub knodes: Option<u64>,
    #[serde(default)]
    pub pvs: Vec<PvLine>,
}

impl Evaluation {
    /// Evaluation with no variations, returned when every source failed.
    pub fn empty(fen: &str) -> Self {
        Self {
            fen: fen.to_string(),
            depth: None,
            knodes: None,
            pvs: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pvs.is_empty()
    }

    /// White-relative centipawn score of the principal line.
    pub fn score_cp(&self) -> Option<i32> {
        self.pvs.first().and_then(PvLine::score_cp)
    }

    /// First move of the principal line, in UCI.
    pub fn best_move(&self) -> Option<&str> {
        self.pvs.first().and_then(PvLine::first_move)
    }
}

/// Result of resolving one position through the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub source: Provenance,
    pub position: String,
    pub evaluation: Evaluation,
    pub depth: Option<u32>,
    /// Wall-clock seconds spent resolving
    pub time_taken: f64,
}

impl AnalysisResult {
    pub fn score_cp(&self) -> Option<i32> {
        self.evaluation.score_cp()
    }

    pub fn best_move(&self) -> Option<&str> {
        self.evaluation.best_move()
    }
}
