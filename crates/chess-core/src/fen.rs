//! FEN (Forsyth-Edwards Notation) parsing and serialization.
//!
//! [`Fen::parse`] validates every field and produces structured data; the
//! engine's board is built from it. Four-field EPD-style records are accepted
//! and get the default clocks `0 1`.

use crate::{Color, Piece, Square};
use thiserror::Error;

/// Errors that can occur when parsing FEN strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 4 or 6 fields, got {0}")]
    InvalidPartCount(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),
}

/// Castle-right bits as stored in a position.
pub mod castle {
    pub const WHITE_KING: u8 = 1;
    pub const WHITE_QUEEN: u8 = 2;
    pub const BLACK_KING: u8 = 4;
    pub const BLACK_QUEEN: u8 = 8;
    pub const ALL: u8 = 15;
}

/// A validated FEN record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen {
    /// Contents of each square, indexed a1 = 0.
    pub squares: [Option<(Piece, Color)>; 64],
    pub side_to_move: Color,
    /// Bit set of [`castle`] rights.
    pub castling: u8,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Fen {
    /// The standard starting position.
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 4 && parts.len() != 6 {
            return Err(FenError::InvalidPartCount(parts.len()));
        }

        let squares = Self::parse_placement(parts[0])?;
        let side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidActiveColor(other.to_string())),
        };
        let castling = Self::parse_castling(parts[2])?;
        let en_passant = Self::parse_en_passant(parts[3])?;

        let (halfmove_clock, fullmove_number) = if parts.len() == 6 {
            let half = parts[4]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidHalfmoveClock(parts[4].to_string()))?;
            let full = parts[5]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidFullmoveNumber(parts[5].to_string()))?;
            (half, full.max(1))
        } else {
            (0, 1)
        };

        Ok(Fen {
            squares,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    fn parse_placement(placement: &str) -> Result<[Option<(Piece, Color)>; 64], FenError> {
        let rows: Vec<&str> = placement.split('/').collect();
        if rows.len() != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "expected 8 ranks, got {}",
                rows.len()
            )));
        }

        let mut squares = [None; 64];
        let mut kings = [0u8; 2];
        // FEN lists rank 8 first.
        for (row, text) in rows.iter().enumerate() {
            let rank = 7 - row;
            let mut file = 0usize;
            for c in text.chars() {
                if let Some(skip) = c.to_digit(10).filter(|d| (1..=8).contains(d)) {
                    file += skip as usize;
                } else if let Some((piece, color)) = Piece::from_fen_char(c) {
                    if file >= 8 {
                        return Err(FenError::InvalidPiecePlacement(format!(
                            "rank {} is too long",
                            rank + 1
                        )));
                    }
                    if piece == Piece::Pawn && (rank == 0 || rank == 7) {
                        return Err(FenError::InvalidPiecePlacement(format!(
                            "pawn on rank {}",
                            rank + 1
                        )));
                    }
                    if piece == Piece::King {
                        kings[color.index()] += 1;
                    }
                    squares[rank * 8 + file] = Some((piece, color));
                    file += 1;
                } else {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "invalid character '{}' in rank {}",
                        c,
                        rank + 1
                    )));
                }
            }
            if file != 8 {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "rank {} has {} squares, expected 8",
                    rank + 1,
                    file
                )));
            }
        }

        if kings != [1, 1] {
            return Err(FenError::InvalidPiecePlacement(
                "each side needs exactly one king".to_string(),
            ));
        }
        Ok(squares)
    }

    fn parse_castling(field: &str) -> Result<u8, FenError> {
        if field == "-" {
            return Ok(0);
        }
        let mut rights = 0;
        for c in field.chars() {
            rights |= match c {
                'K' => castle::WHITE_KING,
                'Q' => castle::WHITE_QUEEN,
                'k' => castle::BLACK_KING,
                'q' => castle::BLACK_QUEEN,
                _ => {
                    return Err(FenError::InvalidCastlingRights(format!(
                        "invalid character '{}'",
                        c
                    )))
                }
            };
        }
        Ok(rights)
    }

    fn parse_en_passant(field: &str) -> Result<Option<Square>, FenError> {
        if field == "-" {
            return Ok(None);
        }
        match Square::from_algebraic(field) {
            Some(sq) if sq.rank_index() == 2 || sq.rank_index() == 5 => Ok(Some(sq)),
            _ => Err(FenError::InvalidEnPassantSquare(field.to_string())),
        }
    }

    /// Serializes back to a six-field FEN string.
    pub fn to_fen(&self) -> String {
        let mut out = String::with_capacity(90);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.squares[rank * 8 + file] {
                    Some((piece, color)) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(self.side_to_move.to_fen_char());
        out.push(' ');
        if self.castling == 0 {
            out.push('-');
        } else {
            for (bit, c) in [
                (castle::WHITE_KING, 'K'),
                (castle::WHITE_QUEEN, 'Q'),
                (castle::BLACK_KING, 'k'),
                (castle::BLACK_QUEEN, 'q'),
            ] {
                if self.castling & bit != 0 {
                    out.push(c);
                }
            }
        }
        out.push(' ');
        match self.en_passant {
            Some(sq) => out.push_str(&sq.to_string()),
            None => out.push('-'),
        }
        out.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_startpos() {
        let fen = Fen::parse(Fen::STARTPOS).unwrap();
        assert_eq!(fen.side_to_move, Color::White);
        assert_eq!(fen.castling, castle::ALL);
        assert_eq!(fen.en_passant, None);
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(fen.squares[0], Some((Piece::Rook, Color::White)));
        assert_eq!(fen.squares[4], Some((Piece::King, Color::White)));
        assert_eq!(fen.squares[60], Some((Piece::King, Color::Black)));
        assert_eq!(fen.squares[12], Some((Piece::Pawn, Color::White)));
        assert_eq!(fen.squares[28], None);
    }

    #[test]
    fn round_trip() {
        for text in [
            Fen::STARTPOS,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbqkbnr/pppp1ppp/8/4pP2/8/8/PPPPP1PP/RNBQKBNR w KQkq e6 0 3",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 12 40",
        ] {
            assert_eq!(Fen::parse(text).unwrap().to_fen(), text);
        }
    }

    #[test]
    fn four_field_records_get_default_clocks() {
        let fen = Fen::parse("4k3/8/8/8/8/8/R7/4K3 w - -").unwrap();
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(fen.to_fen(), "4k3/8/8/8/8/8/R7/4K3 w - - 0 1");
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(Fen::parse(""), Err(FenError::InvalidPartCount(0)));
        assert_eq!(
            Fen::parse("8/8/8/8/8/8/8/8 w - - 0"),
            Err(FenError::InvalidPartCount(5))
        );
    }

    #[test]
    fn rejects_bad_placement() {
        assert!(matches!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            Fen::parse("rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            Fen::parse("rnbqkbnr/ppppxppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQ1BNR w kq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            Fen::parse("P3k3/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
    }

    #[test]
    fn rejects_bad_fields() {
        assert_eq!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 x - - 0 1"),
            Err(FenError::InvalidActiveColor("x".to_string()))
        );
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w KX - 0 1"),
            Err(FenError::InvalidCastlingRights(_))
        ));
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w - e4 0 1"),
            Err(FenError::InvalidEnPassantSquare(_))
        ));
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w - - x 1"),
            Err(FenError::InvalidHalfmoveClock(_))
        ));
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w - - 0 y"),
            Err(FenError::InvalidFullmoveNumber(_))
        ));
    }
}
