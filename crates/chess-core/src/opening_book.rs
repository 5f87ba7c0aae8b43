//! Opening-book filter: recognises early positions that are known theory.
//!
//! Positions are compared on the first four FEN fields (placement, side to
//! move, castling, en passant). A fixed table of common master-game positions
//! is checked first; very early positions fall back to a development heuristic.

use std::collections::HashSet;
use std::sync::LazyLock;

use shakmaty::{Bitboard, Board, Color, Position, Role, Square};

use crate::position::{normalize_fen, parse_fen};

/// Last full move at which a table match still counts as book.
pub const BOOK_MAX_MOVE: u32 = 15;

/// Last full move at which the development heuristic applies.
pub const HEURISTIC_MAX_MOVE: u32 = 6;

/// Well-known positions as placement, side to move and castling rights.
const BOOK_POSITIONS: &[&str] = &[
    // Starting position
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq",
    // 1.e4 and replies
    "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq",
    "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq",
    "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq",
    "rnbqkbnr/pppp1ppp/4p3/8/4P3/8/PPPP1PPP/RNBQKBNR w KQkq",
    "rnbqkbnr/pp1ppppp/2p5/8/4P3/8/PPPP1PPP/RNBQKBNR w KQkq",
    // 1.d4 and replies
    "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq",
    "rnbqkbnr/ppp1pppp/8/3p4/3P4/8/PPP1PPPP/RNBQKBNR w KQkq",
    "rnbqkb1r/pppppppp/5n2/8/3P4/8/PPP1PPPP/RNBQKBNR w KQkq",
    "rnbqkbnr/ppppp1pp/8/5p2/3P4/8/PPP1PPPP/RNBQKBNR w KQkq",
    // 1.Nf3 and replies
    "rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R b KQkq",
    "rnbqkbnr/ppp1pppp/8/3p4/8/5N2/PPPPPPPP/RNBQKB1R w KQkq",
    "rnbqkb1r/pppppppp/5n2/8/8/5N2/PPPPPPPP/RNBQKB1R w KQkq",
    // English
    "rnbqkbnr/pppppppp/8/8/2P5/8/PP1PPPPP/RNBQKBNR b KQkq",
    "rnbqkbnr/pppp1ppp/8/4p3/2P5/8/PP1PPPPP/RNBQKBNR w KQkq",
    "rnbqkbnr/pp1ppppp/8/2p5/2P5/8/PP1PPPPP/RNBQKBNR w KQkq",
    // King's Indian Attack setup
    "rnbqkb1r/pppppppp/5n2/8/8/5NP1/PPPPPP1P/RNBQKB1R b KQkq",
    // Italian Game
    "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq",
    // Ruy Lopez
    "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq",
    // Queen's Gambit
    "rnbqkbnr/ppp1pppp/8/3p4/2PP4/8/PP2PPPP/RNBQKBNR b KQkq",
    // Sicilian, Dragon setup
    "rnbqkb1r/pp2pppp/3p1n2/2p5/3PP3/2N2N2/PPP2PPP/R1BQKB1R b KQkq",
];

// None of the tabled positions allows an en-passant capture, so the
// canonical fourth field is always `-`.
static BOOK: LazyLock<HashSet<String>> =
    LazyLock::new(|| BOOK_POSITIONS.iter().map(|p| format!("{p} -")).collect());

/// Is this position known opening theory at the given full-move number?
pub fn is_book_move(fen: &str, move_number: u32) -> bool {
    if move_number > BOOK_MAX_MOVE {
        return false;
    }

    if BOOK.contains(&normalize_fen(fen)) {
        return true;
    }

    if move_number <= HEURISTIC_MAX_MOVE {
        return is_reasonable_opening(fen);
    }

    false
}

/// Any centre pawn on d4/e4/d5/e5, or any minor piece off its home square.
fn is_reasonable_opening(fen: &str) -> bool {
    let Ok(pos) = parse_fen(fen) else {
        return false;
    };
    let board = pos.board();
    has_center_pawn(board) || has_developed_minor(board)
}

fn has_center_pawn(board: &Board) -> bool {
    [Square::D4, Square::E4, Square::D5, Square::E5]
        .into_iter()
        .any(|sq| board.role_at(sq) == Some(Role::Pawn))
}

fn has_developed_minor(board: &Board) -> bool {
    let minors: Bitboard = board.knights() | board.bishops();
    minors.into_iter().any(|sq| {
        let home: [Square; 4] = match board.color_at(sq) {
            Some(Color::White) => [Square::B1, Square::C1, Square::F1, Square::G1],
            Some(Color::Black) => [Square::B8, Square::C8, Square::F8, Square::G8],
            None => return false,
        };
        !home.contains(&sq)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::STANDARD_START_FEN;

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
    const RUY_LOPEZ: &str = "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3";

    #[test]
    fn test_table_positions_are_book() {
        assert!(is_book_move(STANDARD_START_FEN, 1));
        assert!(is_book_move(AFTER_E4, 1));
        assert!(is_book_move(RUY_LOPEZ, 3));
    }

    #[test]
    fn test_table_match_respects_move_window() {
        assert!(is_book_move(RUY_LOPEZ, 15));
        assert!(!is_book_move(RUY_LOPEZ, 16));
    }

    #[test]
    fn test_move_counters_are_ignored() {
        let with_counters = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 7 12";
        assert!(is_book_move(with_counters, 12));
    }

    #[test]
    fn test_heuristic_center_pawn() {
        // 1.a3 e5: not tabled, black has a centre pawn
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/8/P7/1PPPPPPP/RNBQKBNR w KQkq - 0 2";
        assert!(is_book_move(fen, 2));
        assert!(!is_book_move(fen, 7));
    }

    #[test]
    fn test_heuristic_developed_minor() {
        // 1.Nc3 a6: knight off its home square
        let fen = "rnbqkbnr/1ppppppp/p7/8/8/2N5/PPPPPPPP/R1BQKBNR w KQkq - 0 2";
        assert!(is_book_move(fen, 2));
    }

    #[test]
    fn test_heuristic_rejects_undeveloped_flank_moves() {
        // 1.a3 a6 2.h3 h6: nothing in the centre, nothing developed
        let fen = "rnbqkbnr/1pppppp1/p6p/8/8/P6P/1PPPPPP1/RNBQKBNR w KQkq - 0 3";
        assert!(!is_book_move(fen, 3));
    }
}
