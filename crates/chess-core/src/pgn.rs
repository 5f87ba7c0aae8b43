//! Move-text parsing: lightweight regex cleanup, then replay with shakmaty.
//!
//! Accepts full PGN (headers, comments, clock annotations, variations, NAGs)
//! as well as bare move lists. Each token is tried as SAN first, then as UCI.

use std::sync::LazyLock;

use regex::Regex;
use shakmaty::{san::San, uci::UciMove, CastlingMode, Chess, Move, Position};
use thiserror::Error;

use crate::game_data::{GameMetadata, ParsedGame, ParsedMove, Side};
use crate::position::{parse_fen, to_fen};

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).unwrap());
static ANY_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^}]*\}").unwrap());
static LINE_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r";[^\n]*").unwrap());
// Innermost variation only; applied until nothing is left.
static VARIATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^()]*\)").unwrap());
static NAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\d+").unwrap());
static MOVE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.+").unwrap());

#[derive(Error, Debug)]
pub enum PgnError {
    #[error("Move text is empty")]
    Empty,

    #[error("No valid moves found in move text")]
    NoMoves,

    #[error("Illegal move or error parsing move '{token}' at ply {index}: {reason}")]
    IllegalMove {
        index: usize,
        token: String,
        reason: String,
    },

    #[error("Invalid starting position: {0}")]
    InvalidStartPosition(String),
}

/// Parse move text into the ordered sequence of replayed plies.
pub fn parse_moves(text: &str) -> Result<ParsedGame, PgnError> {
    // Drop control characters that some exports embed
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    if cleaned.trim().is_empty() {
        return Err(PgnError::Empty);
    }

    let (metadata, start_fen) = parse_headers(&cleaned);

    let mut pos = match start_fen {
        Some(ref fen) => parse_fen(fen).map_err(PgnError::InvalidStartPosition)?,
        None => Chess::default(),
    };
    let start_fen = to_fen(&pos);

    let mut moves = Vec::new();
    for token in movetext_tokens(&cleaned) {
        let index = moves.len();
        let mv = resolve_token(&pos, &token).map_err(|reason| PgnError::IllegalMove {
            index,
            token: token.clone(),
            reason,
        })?;

        let fen_before = to_fen(&pos);
        let san = San::from_move(&pos, mv).to_string();
        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        let color = Side::from(pos.turn());

        pos.play_unchecked(mv);

        moves.push(ParsedMove {
            index,
            san,
            uci,
            color,
            fen_before,
            fen_after: to_fen(&pos),
        });
    }

    if moves.is_empty() {
        return Err(PgnError::NoMoves);
    }

    Ok(ParsedGame {
        metadata,
        start_fen,
        moves,
    })
}

fn parse_headers(pgn: &str) -> (GameMetadata, Option<String>) {
    let mut metadata = GameMetadata {
        white: "Unknown".to_string(),
        black: "Unknown".to_string(),
        result: "*".to_string(),
        ..Default::default()
    };
    let mut fen = None;

    for cap in HEADER_RE.captures_iter(pgn) {
        let key = &cap[1];
        let value = cap[2].to_string();
        match key {
            "White" => metadata.white = value,
            "Black" => metadata.black = value,
            "Result" => metadata.result = value,
            "Date" => metadata.date = Some(value),
            "TimeControl" => metadata.time_control = Some(value),
            "ECO" => metadata.eco = Some(value),
            "Event" => metadata.event = Some(value),
            "Site" => metadata.site = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    (metadata, fen)
}

/// Strip headers, comments, variations and annotations; yield move tokens.
fn movetext_tokens(pgn: &str) -> Vec<String> {
    let no_headers = ANY_HEADER_RE.replace_all(pgn, " ");
    let no_comments = COMMENT_RE.replace_all(&no_headers, " ");
    let mut text = LINE_COMMENT_RE.replace_all(&no_comments, " ").into_owned();

    loop {
        let next = VARIATION_RE.replace_all(&text, " ").into_owned();
        if next == text {
            break;
        }
        text = next;
    }
    let text = NAG_RE.replace_all(&text, " ");

    text.split_whitespace()
        .map(|raw| MOVE_NUMBER_RE.replace(raw, "").into_owned())
        .map(|token| token.trim_end_matches(['!', '?', '+', '#']).to_string())
        .map(|token| match token.as_str() {
            // Castling written with zeros
            "0-0" => "O-O".to_string(),
            "0-0-0" => "O-O-O".to_string(),
            _ => token,
        })
        .filter(|token| {
            !token.is_empty() && !matches!(token.as_str(), "1-0" | "0-1" | "1/2-1/2" | "*")
        })
        .collect()
}

fn resolve_token(pos: &Chess, token: &str) -> Result<Move, String> {
    let san_error = match token.parse::<San>() {
        Ok(san) => match san.to_move(pos) {
            Ok(mv) => return Ok(mv),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    // Some sources export long algebraic (e2e4) instead of SAN
    let uci: UciMove = token.parse().map_err(|_| san_error.clone())?;
    uci.to_move(pos).map_err(|e| format!("{san_error}; as UCI: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::STANDARD_START_FEN;

    #[test]
    fn test_parse_pgn_basic() {
        let pgn = r#"[White "Player1"]
[Black "Player2"]
[Result "1-0"]
[Date "2025.01.15"]
[TimeControl "600"]

1. e4 e5 2. Nf3 Nc6 1-0"#;

        let game = parse_moves(pgn).unwrap();
        assert_eq!(game.metadata.white, "Player1");
        assert_eq!(game.metadata.black, "Player2");
        assert_eq!(game.metadata.result, "1-0");
        assert_eq!(game.moves.len(), 4);
        assert_eq!(game.moves[0].san, "e4");
        assert_eq!(game.moves[0].uci, "e2e4");
        assert_eq!(game.moves[0].color, Side::White);
        assert_eq!(game.moves[1].color, Side::Black);
        assert_eq!(game.start_fen, STANDARD_START_FEN);
        assert_eq!(game.moves[1].fen_before, game.moves[0].fen_after);
    }

    #[test]
    fn test_comments_clocks_and_variations_are_ignored() {
        let pgn = "1. e4 {[%clk 0:02:59.9]} 1... c5 (1... e5 2. Nf3 (2. Bc4)) 2. Nf3! $1 d6?! *";
        let game = parse_moves(pgn).unwrap();
        let sans: Vec<&str> = game.moves.iter().map(|m| m.san.as_str()).collect();
        assert_eq!(sans, vec!["e4", "c5", "Nf3", "d6"]);
    }

    #[test]
    fn test_uci_tokens_are_accepted() {
        let game = parse_moves("e2e4 e7e5 g1f3").unwrap();
        assert_eq!(game.moves.len(), 3);
        assert_eq!(game.moves[2].san, "Nf3");
    }

    #[test]
    fn test_castling_uci() {
        let game = parse_moves("1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. O-O").unwrap();
        assert_eq!(game.moves[6].uci, "e1g1");
    }

    #[test]
    fn test_castling_with_zeros() {
        let game = parse_moves("1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. 0-0 Nf6 5. d3 d6 6. Bg5 Qe7 7. Nc3 Bd7 8. Qd2 0-0-0+").unwrap();
        assert_eq!(game.moves[6].san, "O-O");
        assert_eq!(game.moves[6].uci, "e1g1");
        assert_eq!(game.moves[15].san, "O-O-O");
        assert_eq!(game.moves[15].uci, "e8c8");
    }

    #[test]
    fn test_fen_header_sets_start() {
        let pgn = r#"[SetUp "1"]
[FEN "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"]

1... e5 2. Nf3"#;
        let game = parse_moves(pgn).unwrap();
        assert_eq!(game.moves[0].color, Side::Black);
        assert_eq!(game.moves[0].move_number(), 1);
        assert_eq!(game.moves[1].move_number(), 2);
        assert_eq!(game.moves.len(), 2);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_moves("   "), Err(PgnError::Empty)));
        assert!(matches!(parse_moves("[Event \"x\"] *"), Err(PgnError::NoMoves)));
        assert!(matches!(
            parse_moves("1. e4 e4"),
            Err(PgnError::IllegalMove { index: 1, .. })
        ));
    }
}
