//! FEN helpers shared by the parser, the book filter and the reviewer.

use shakmaty::{fen::Fen, uci::UciMove, CastlingMode, Chess, EnPassantMode, Position};

use crate::game_data::Side;

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// How a game stands once no legal move is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// The side to move is checkmated
    Checkmate,
    Stalemate,
}

/// Parse and legality-check a FEN string.
pub fn parse_fen(fen: &str) -> Result<Chess, String> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| format!("Invalid FEN '{fen}': {e}"))?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| format!("Illegal position '{fen}': {e}"))
}

/// Canonical FEN for a position.
pub fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Strips move counters from FEN, keeping only position + side + castling + ep.
pub fn normalize_fen(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

/// Side to move read from the second FEN field. Defaults to White when absent.
pub fn side_to_move(fen: &str) -> Side {
    match fen.split_whitespace().nth(1) {
        Some("b") => Side::Black,
        _ => Side::White,
    }
}

/// Terminal state of a position, if any.
pub fn terminal_state(pos: &Chess) -> Option<Terminal> {
    if pos.is_checkmate() {
        Some(Terminal::Checkmate)
    } else if pos.is_stalemate() {
        Some(Terminal::Stalemate)
    } else {
        None
    }
}

/// Apply a UCI move to a FEN, returning the resulting position.
/// `None` when the FEN is invalid or the move is not legal there.
pub fn play_uci(fen: &str, uci: &str) -> Option<Chess> {
    let pos = parse_fen(fen).ok()?;
    let uci_move: UciMove = uci.parse().ok()?;
    let mv = uci_move.to_move(&pos).ok()?;
    let mut next = pos;
    next.play_unchecked(mv);
    Some(next)
}
