use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMetadata {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub date: Option<String>,
    pub time_control: Option<String>,
    pub eco: Option<String>,
    pub event: Option<String>,
    pub site: Option<String>,
}

/// Side that made a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Re-express a White-relative value from this side's point of view.
    pub fn perspective<T: std::ops::Neg<Output = T>>(self, white_relative: T) -> T {
        match self {
            Side::White => white_relative,
            Side::Black => -white_relative,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl From<shakmaty::Color> for Side {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Side::White,
            shakmaty::Color::Black => Side::Black,
        }
    }
}

/// One ply replayed from move text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMove {
    /// Zero-based ply index
    pub index: usize,
    pub san: String,
    pub uci: String,
    pub color: Side,
    pub fen_before: String,
    pub fen_after: String,
}

impl ParsedMove {
    /// Full-move number as printed in PGN, read from the FEN counter so
    /// games set up from a custom position number correctly.
    pub fn move_number(&self) -> u32 {
        self.fen_before
            .split_whitespace()
            .nth(5)
            .and_then(|n| n.parse().ok())
            .unwrap_or((self.index / 2 + 1) as u32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedGame {
    pub metadata: GameMetadata,
    pub start_fen: String,
    pub moves: Vec<ParsedMove>,
}

impl ParsedGame {
    /// Every distinct position of the game in order: start, then after each ply.
    pub fn positions(&self) -> Vec<String> {
        let mut fens = Vec::with_capacity(self.moves.len() + 1);
        fens.push(self.start_fen.clone());
        fens.extend(self.moves.iter().map(|m| m.fen_after.clone()));
        fens
    }
}
