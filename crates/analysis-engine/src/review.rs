//! Whole-game review: resolve every position, classify every move, and
//! aggregate per-side accuracy.
//!
//! Positions are resolved in two explicit batches: first the start position
//! and the position after each ply, then the position after each suggested
//! best move that differs from the move actually played.

use std::collections::{HashMap, HashSet};

use chess_core::opening_book::is_book_move;
use chess_core::position::{parse_fen, play_uci, side_to_move, terminal_state, to_fen, Terminal};
use chess_core::{GameMetadata, ParsedGame, ParsedMove, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{
    average_cp_loss, calculate_accuracy, calculate_cp_loss, classify_move, round1, round2,
    Classification, ClassificationCounts,
};
use crate::evaluation::{AnalysisResult, MATE_SCORE};
use crate::resolver::Resolver;

/// Review uses the principal line only.
const REVIEW_MULTI_PV: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerSide<T> {
    pub white: T,
    pub black: T,
}

impl<T> PerSide<T> {
    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }
}

/// One reviewed move. Evaluations are in pawns from the mover's side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub move_index: usize,
    #[serde(rename = "move")]
    pub move_uci: String,
    pub san: String,
    pub classification: Classification,
    pub eval_before: f64,
    pub eval_after: f64,
    /// Centipawn loss against the best line
    pub eval_drop: f64,
    pub best_move: Option<String>,
    pub color: Side,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameReviewResult {
    pub accuracy: PerSide<f64>,
    pub classifications: PerSide<ClassificationCounts>,
    pub avg_cpl: PerSide<f64>,
    pub moves: Vec<MoveRecord>,
    /// Every parsed ply, including ones skipped for lack of evaluations
    pub total_moves: usize,
    pub metadata: GameMetadata,
}

/// White-relative scores for every resolved position.
struct Scores {
    by_fen: HashMap<String, AnalysisResult>,
}

impl Scores {
    fn new() -> Self {
        Self {
            by_fen: HashMap::new(),
        }
    }

    fn absorb(&mut self, results: Vec<AnalysisResult>) {
        for result in results {
            self.by_fen.insert(result.position.clone(), result);
        }
    }

    /// Terminal positions are scored directly; everything else comes from
    /// the resolver. `None` when no source produced a score.
    fn white_cp(&self, fen: &str) -> Option<i32> {
        if let Some(terminal) = terminal_of(fen) {
            return Some(terminal_white_cp(fen, terminal));
        }
        self.by_fen.get(fen).and_then(AnalysisResult::score_cp)
    }

    fn best_move(&self, fen: &str) -> Option<&str> {
        self.by_fen.get(fen).and_then(AnalysisResult::best_move)
    }
}

fn terminal_of(fen: &str) -> Option<Terminal> {
    parse_fen(fen).ok().as_ref().and_then(terminal_state)
}

/// The side to move is the one that got mated.
fn terminal_white_cp(fen: &str, terminal: Terminal) -> i32 {
    match terminal {
        Terminal::Checkmate => side_to_move(fen).perspective(-MATE_SCORE),
        Terminal::Stalemate => 0,
    }
}

/// Position after the suggested best move, if it differs from the played move.
fn best_line_fen(mv: &ParsedMove, best: Option<&str>) -> Option<String> {
    let best = best?;
    if best == mv.uci {
        return None;
    }
    play_uci(&mv.fen_before, best).map(|pos| to_fen(&pos))
}

/// Positions still needing a resolver call, deduplicated, in first-seen order.
fn pending(fens: impl IntoIterator<Item = String>, scores: &Scores) -> Vec<String> {
    let mut seen = HashSet::new();
    fens.into_iter()
        .filter(|fen| !scores.by_fen.contains_key(fen) && terminal_of(fen).is_none())
        .filter(|fen| seen.insert(fen.clone()))
        .collect()
}

pub async fn review_game(resolver: &Resolver, game: &ParsedGame, depth: u32) -> GameReviewResult {
    info!(plies = game.moves.len(), depth, "Starting game review");
    let mut scores = Scores::new();

    let first = pending(game.positions(), &scores);
    debug!(positions = first.len(), "Resolving game positions");
    scores.absorb(resolver.resolve_batch(&first, REVIEW_MULTI_PV, depth).await);

    let best_fens: Vec<Option<String>> = game
        .moves
        .iter()
        .map(|mv| best_line_fen(mv, scores.best_move(&mv.fen_before)))
        .collect();
    let second = pending(best_fens.iter().flatten().cloned(), &scores);
    debug!(positions = second.len(), "Resolving best-move positions");
    scores.absorb(resolver.resolve_batch(&second, REVIEW_MULTI_PV, depth).await);

    let mut records = Vec::with_capacity(game.moves.len());
    let mut counts = PerSide::<ClassificationCounts>::default();
    let mut losses = PerSide::<Vec<f64>>::default();

    for (mv, best_fen) in game.moves.iter().zip(&best_fens) {
        let (Some(before_cp), Some(after_cp)) =
            (scores.white_cp(&mv.fen_before), scores.white_cp(&mv.fen_after))
        else {
            warn!(ply = mv.index, san = %mv.san, "Skipping move without evaluations");
            continue;
        };

        let best_move = scores.best_move(&mv.fen_before).map(String::from);
        let best_cp = match (best_move.as_deref(), best_fen) {
            (Some(best), _) if best == mv.uci => after_cp,
            (_, Some(fen)) => scores.white_cp(fen).unwrap_or(before_cp),
            _ => before_cp,
        };

        let side = mv.color;
        let pawns = |cp: i32| f64::from(side.perspective(cp)) / 100.0;
        let (eval_before, eval_after, eval_best) = (pawns(before_cp), pawns(after_cp), pawns(best_cp));

        let is_book = is_book_move(&mv.fen_before, mv.move_number());
        let classification = classify_move(eval_before, eval_after, eval_best, is_book);
        let loss = calculate_cp_loss(eval_after, eval_best);

        if !is_book {
            losses.get_mut(side).push(loss);
        }
        counts.get_mut(side).record(classification);

        debug!(
            ply = mv.index,
            san = %mv.san,
            classification = classification.as_str(),
            eval_before,
            eval_after,
            loss,
            "Classified move"
        );

        records.push(MoveRecord {
            move_index: mv.index,
            move_uci: mv.uci.clone(),
            san: mv.san.clone(),
            classification,
            eval_before: round2(eval_before),
            eval_after: round2(eval_after),
            eval_drop: round1(loss),
            best_move,
            color: side,
        });
    }

    let accuracy = PerSide {
        white: calculate_accuracy(&losses.white),
        black: calculate_accuracy(&losses.black),
    };
    let avg_cpl = PerSide {
        white: average_cp_loss(&losses.white),
        black: average_cp_loss(&losses.black),
    };

    info!(
        reviewed = records.len(),
        total = game.moves.len(),
        white_accuracy = accuracy.white,
        black_accuracy = accuracy.black,
        "Game review complete"
    );

    GameReviewResult {
        accuracy,
        classifications: counts,
        avg_cpl,
        moves: records,
        total_moves: game.moves.len(),
        metadata: game.metadata.clone(),
    }
}
