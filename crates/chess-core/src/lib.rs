//! Chess primitives for game review: move-text replay, FEN helpers and the
//! opening-book filter.

pub mod game_data;
pub mod opening_book;
pub mod pgn;
pub mod position;

pub use game_data::{GameMetadata, ParsedGame, ParsedMove, Side};
