//! Packed move representation.
//!
//! A move fits in 21 bits of a `u32`:
//!
//! | bits   | field                          |
//! |--------|--------------------------------|
//! | 0..6   | from square                    |
//! | 6..12  | to square                      |
//! | 12..15 | moving piece + 1               |
//! | 15..18 | captured piece + 1, 0 if none  |
//! | 18..21 | promotion piece + 1, 0 if none |
//!
//! Piece codes are offset by one so that the all-zero word is [`Move::NONE`].
//! Carrying the mover and the victim lets the board undo a move and the
//! search order moves without looking anything up.

use crate::{Piece, Square};
use std::fmt;

const FROM_SHIFT: u32 = 0;
const TO_SHIFT: u32 = 6;
const PIECE_SHIFT: u32 = 12;
const CAPTURE_SHIFT: u32 = 15;
const PROMOTE_SHIFT: u32 = 18;

/// A move in packed 32-bit form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Move(u32);

#[inline]
const fn piece_code(piece: Option<Piece>) -> u32 {
    match piece {
        Some(p) => p as u32 + 1,
        None => 0,
    }
}

#[inline]
const fn decode_piece(code: u32) -> Option<Piece> {
    if code == 0 {
        None
    } else {
        Piece::from_index((code - 1) as usize)
    }
}

impl Move {
    /// The empty move.
    pub const NONE: Move = Move(0);

    /// Number of significant bits in a packed move.
    pub const BITS: u32 = 21;

    #[inline]
    pub const fn new(
        from: Square,
        to: Square,
        piece: Piece,
        captured: Option<Piece>,
        promoted: Option<Piece>,
    ) -> Self {
        Move(
            (from.index() as u32) << FROM_SHIFT
                | (to.index() as u32) << TO_SHIFT
                | (piece as u32 + 1) << PIECE_SHIFT
                | piece_code(captured) << CAPTURE_SHIFT
                | piece_code(promoted) << PROMOTE_SHIFT,
        )
    }

    /// Reinterprets a packed value, e.g. one read back from the hash table.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Move(raw & ((1 << Self::BITS) - 1))
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn from(self) -> Square {
        Square::from_index_masked(self.0 >> FROM_SHIFT)
    }

    #[inline]
    pub const fn to(self) -> Square {
        Square::from_index_masked(self.0 >> TO_SHIFT)
    }

    /// The moving piece. Pawn for [`Move::NONE`].
    #[inline]
    pub const fn piece(self) -> Piece {
        match decode_piece((self.0 >> PIECE_SHIFT) & 7) {
            Some(p) => p,
            None => Piece::Pawn,
        }
    }

    #[inline]
    pub const fn captured(self) -> Option<Piece> {
        decode_piece((self.0 >> CAPTURE_SHIFT) & 7)
    }

    #[inline]
    pub const fn promoted(self) -> Option<Piece> {
        decode_piece((self.0 >> PROMOTE_SHIFT) & 7)
    }

    #[inline]
    pub const fn is_capture(self) -> bool {
        (self.0 >> CAPTURE_SHIFT) & 7 != 0
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        (self.0 >> PROMOTE_SHIFT) & 7 != 0
    }

    /// Neither a capture nor a promotion.
    #[inline]
    pub const fn is_quiet(self) -> bool {
        (self.0 >> CAPTURE_SHIFT) == 0
    }

    /// A king stepping two files.
    #[inline]
    pub const fn is_castle(self) -> bool {
        matches!(self.piece(), Piece::King)
            && (self.from().file_index() as i8 - self.to().file_index() as i8).abs() == 2
    }

    /// A pawn advancing two ranks.
    #[inline]
    pub const fn is_double_push(self) -> bool {
        matches!(self.piece(), Piece::Pawn)
            && (self.from().index() as i32 - self.to().index() as i32).abs() == 16
    }

    /// Long algebraic notation, `e2e4` or `e7e8q`. The empty move prints as `0000`.
    pub fn to_uci(self) -> String {
        if self.is_none() {
            return "0000".to_string();
        }
        match self.promoted() {
            Some(p) => format!("{}{}{}", self.from(), self.to(), p.to_char()),
            None => format!("{}{}", self.from(), self.to()),
        }
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("Move(none)");
        }
        write!(f, "Move({} {:?}", self.to_uci(), self.piece())?;
        if let Some(victim) = self.captured() {
            write!(f, "x{victim:?}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

/// A move as written by a GUI, before it has been matched against a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
}

impl UciMove {
    /// Parses `e2e4` / `e7e8q` text. Promotion letters are accepted in either case.
    pub fn parse(s: &str) -> Option<Self> {
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => match Piece::from_char(c.to_ascii_lowercase())? {
                Piece::Pawn | Piece::King => return None,
                p => Some(p),
            },
        };
        Some(UciMove {
            from,
            to,
            promotion,
        })
    }

    /// True when `mv` is the move this text describes.
    pub fn matches(&self, mv: Move) -> bool {
        mv.from() == self.from && mv.to() == self.to && mv.promoted() == self.promotion
    }
}
