//! Move classification and accuracy aggregation. Pure functions, no I/O.
//!
//! Every evaluation here is in pawns from the mover's point of view: higher
//! is better for the side that just moved.

use serde::{Deserialize, Serialize};

/// Classification thresholds (centipawn loss, inclusive upper bounds)
const THRESHOLD_BEST: f64 = 15.0;
const THRESHOLD_EXCELLENT: f64 = 25.0;
const THRESHOLD_GOOD: f64 = 50.0;
const THRESHOLD_INACCURACY: f64 = 100.0;
const THRESHOLD_MISTAKE: f64 = 200.0;

/// A move that drops the mover's own evaluation by more than this while
/// staying within `THRESHOLD_BEST` of the best line is a sacrifice.
const BRILLIANT_GAIN: f64 = -100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Brilliant,
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
    Book,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Brilliant => "brilliant",
            Classification::Best => "best",
            Classification::Excellent => "excellent",
            Classification::Good => "good",
            Classification::Inaccuracy => "inaccuracy",
            Classification::Mistake => "mistake",
            Classification::Blunder => "blunder",
            Classification::Book => "book",
        }
    }
}

/// Pawns to centipawns, snapped to 1e-4 cp to absorb float noise.
fn to_cp(pawns: f64) -> f64 {
    (pawns * 100.0 * 1e4).round() / 1e4
}

/// Distance between the played move and the best line, in centipawns.
pub fn calculate_cp_loss(eval_after: f64, eval_best: f64) -> f64 {
    to_cp((eval_best - eval_after).abs())
}

/// How much the move changed the mover's own evaluation, in centipawns.
pub fn calculate_gain(eval_before: f64, eval_after: f64) -> f64 {
    to_cp(eval_after - eval_before)
}

pub fn classify_move(eval_before: f64, eval_after: f64, eval_best: f64, is_book: bool) -> Classification {
    if is_book {
        return Classification::Book;
    }

    let loss = calculate_cp_loss(eval_after, eval_best);
    let gain = calculate_gain(eval_before, eval_after);

    if gain < BRILLIANT_GAIN && loss <= THRESHOLD_BEST {
        return Classification::Brilliant;
    }

    if loss <= THRESHOLD_BEST {
        Classification::Best
    } else if loss <= THRESHOLD_EXCELLENT {
        Classification::Excellent
    } else if loss <= THRESHOLD_GOOD {
        Classification::Good
    } else if loss <= THRESHOLD_INACCURACY {
        Classification::Inaccuracy
    } else if loss <= THRESHOLD_MISTAKE {
        Classification::Mistake
    } else {
        Classification::Blunder
    }
}

/// Accuracy from the centipawn losses of one side's non-book moves.
pub fn calculate_accuracy(losses: &[f64]) -> f64 {
    if losses.is_empty() {
        return 100.0;
    }
    let avg = average(losses);
    let accuracy = (103.0 - 7.0 * (avg + 1.0).ln()).clamp(0.0, 100.0);
    round1(accuracy)
}

/// Mean centipawn loss, one decimal. Zero for an empty list.
pub fn average_cp_loss(losses: &[f64]) -> f64 {
    if losses.is_empty() {
        return 0.0;
    }
    round1(average(losses))
}

fn average(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub brilliant: u32,
    pub best: u32,
    pub excellent: u32,
    pub good: u32,
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
    pub book: u32,
}

impl ClassificationCounts {
    pub fn record(&mut self, label: Classification) {
        let slot = match label {
            Classification::Brilliant => &mut self.brilliant,
            Classification::Best => &mut self.best,
            Classification::Excellent => &mut self.excellent,
            Classification::Good => &mut self.good,
            Classification::Inaccuracy => &mut self.inaccuracy,
            Classification::Mistake => &mut self.mistake,
            Classification::Blunder => &mut self.blunder,
            Classification::Book => &mut self.book,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u32 {
        self.brilliant
            + self.best
            + self.excellent
            + self.good
            + self.inaccuracy
            + self.mistake
            + self.blunder
            + self.book
    }
}
