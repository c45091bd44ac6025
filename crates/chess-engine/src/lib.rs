//! Board representation and move generation.
//!
//! This crate provides:
//! - [`Bitboard`] - 64-bit square sets with the usual shifts and iteration
//! - [`Board`] - incrementally updated position with make/unmake and Zobrist keys
//! - [`exchange`] - attack maps, pin detection and static exchange evaluation
//! - [`movegen`] - staged move generation with ordering keys, plus perft
//!
//! # Example
//!
//! ```
//! use chess_engine::{movegen, Board};
//!
//! let mut board = Board::startpos();
//! let moves = movegen::legal_moves(&board);
//! assert_eq!(moves.len(), 20);
//!
//! let e4 = board.find_move("e2e4").unwrap();
//! let memento = board.make(e4);
//! board.unmake(e4, memento);
//! assert_eq!(board, Board::startpos());
//! ```

mod bitboard;
mod board;
pub mod exchange;
pub mod movegen;
pub mod tables;
mod zobrist;

pub use bitboard::Bitboard;
pub use board::{Board, BoardError, Memento, MAX_PHASE};
pub use exchange::{attack_map, is_pinned, see};
pub use movegen::perft::{perft, perft_divide};
pub use movegen::{
    bishop_attacks, king_attacks, knight_attacks, legal_moves, pawn_attacks, queen_attacks,
    rook_attacks, MoveList, ScoredMove,
};
pub use tables::{tables, Direction};
pub use zobrist::{ZobristKeys, ZOBRIST};
