//! Core types for chess.
//!
//! This crate provides the plain value types shared by the engine crates:
//! - [`Piece`] and [`Color`]
//! - [`Square`], [`File`], and [`Rank`]
//! - [`Move`], packed into 32 bits, and [`UciMove`] for text input
//! - FEN parsing and serialization

mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use color::Color;
pub use fen::{castle, Fen, FenError};
pub use mov::{Move, UciMove};
pub use piece::Piece;
pub use square::{File, Rank, Square};
