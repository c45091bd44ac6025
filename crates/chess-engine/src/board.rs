//! Mutable position with incremental make/unmake.
//!
//! A [`Board`] keeps per-side piece bitboards, a square map, occupancy,
//! material, the endgame counter and both Zobrist keys in step as moves are
//! made. [`Board::make`] returns a [`Memento`] holding what cannot be
//! recomputed; [`Board::unmake`] puts the pieces back and restores the rest
//! from it.

use crate::exchange::attack_map;
use crate::movegen::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks};
use crate::tables::tables;
use crate::zobrist::ZOBRIST;
use crate::Bitboard;
use chess_core::{castle, Color, Fen, FenError, Move, Piece, Square};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error(transparent)]
    Fen(#[from] FenError),

    #[error("the side not to move is in check")]
    OpponentInCheck,

    #[error("inconsistent board: {0}")]
    Corrupt(String),
}

/// Largest value of the endgame counter: all minor and major pieces on the board.
pub const MAX_PHASE: u8 = 24;

/// State [`Board::make`] overwrites and [`Board::unmake`] needs back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Memento {
    pub key: u64,
    pub pawn_key: u32,
    pub castle: u8,
    pub en_passant: Option<Square>,
    pub halfmove: u32,
}

/// Rights kept when a move touches each square.
const CASTLE_MASK: [u8; 64] = {
    let mut mask = [castle::ALL; 64];
    mask[0] = castle::ALL & !castle::WHITE_QUEEN;
    mask[4] = castle::ALL & !(castle::WHITE_KING | castle::WHITE_QUEEN);
    mask[7] = castle::ALL & !castle::WHITE_KING;
    mask[56] = castle::ALL & !castle::BLACK_QUEEN;
    mask[60] = castle::ALL & !(castle::BLACK_KING | castle::BLACK_QUEEN);
    mask[63] = castle::ALL & !castle::BLACK_KING;
    mask
};

/// Rook origin and destination for a castling king landing on `king_to`.
#[inline]
pub(crate) fn castle_rook(king_to: Square) -> Option<(Square, Square)> {
    match king_to {
        Square::G1 => Some((Square::H1, Square::F1)),
        Square::C1 => Some((Square::A1, Square::D1)),
        Square::G8 => Some((Square::H8, Square::F8)),
        Square::C8 => Some((Square::A8, Square::D8)),
        _ => None,
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    pieces: [[Bitboard; 6]; 2],
    squares: [Option<Piece>; 64],
    occupied: [Bitboard; 2],
    material: [i32; 2],
    non_pawn: [u8; 2],
    side: Color,
    castle: u8,
    en_passant: Option<Square>,
    halfmove: u32,
    fullmove: u32,
    key: u64,
    pawn_key: u32,
}

impl Board {
    fn empty() -> Self {
        Board {
            pieces: [[Bitboard::EMPTY; 6]; 2],
            squares: [None; 64],
            occupied: [Bitboard::EMPTY; 2],
            material: [0; 2],
            non_pawn: [0; 2],
            side: Color::White,
            castle: 0,
            en_passant: None,
            halfmove: 0,
            fullmove: 1,
            key: 0,
            pawn_key: 0,
        }
    }

    pub fn startpos() -> Self {
        Self::from_fen(Fen::STARTPOS).expect("STARTPOS is valid")
    }

    pub fn from_fen(text: &str) -> Result<Self, BoardError> {
        let fen = Fen::parse(text)?;
        let board = Board::from_parsed(&fen);
        if board.is_attacked(board.king_square(board.side.opposite()), board.side) {
            return Err(BoardError::OpponentInCheck);
        }
        board.validate()?;
        Ok(board)
    }

    fn from_parsed(fen: &Fen) -> Self {
        let mut board = Board::empty();
        for (index, content) in fen.squares.iter().enumerate() {
            if let Some((piece, color)) = *content {
                board.set_piece(color, piece, Square::from_index_masked(index as u32));
            }
        }
        board.side = fen.side_to_move;
        board.halfmove = fen.halfmove_clock;
        board.fullmove = fen.fullmove_number;

        // Rights whose king or rook has left home can never be used.
        let homes = [
            (castle::WHITE_KING, Color::White, Square::E1, Square::H1),
            (castle::WHITE_QUEEN, Color::White, Square::E1, Square::A1),
            (castle::BLACK_KING, Color::Black, Square::E8, Square::H8),
            (castle::BLACK_QUEEN, Color::Black, Square::E8, Square::A8),
        ];
        for (bit, color, king, rook) in homes {
            if fen.castling & bit != 0
                && board.pieces(color, Piece::King).contains(king)
                && board.pieces(color, Piece::Rook).contains(rook)
            {
                board.castle |= bit;
            }
        }

        // Only keep an en-passant square a pawn can actually capture on.
        board.en_passant = fen
            .en_passant
            .filter(|&sq| board.ep_capturable(sq, board.side));

        board.key = board.compute_key();
        board.pawn_key = board.compute_pawn_key();
        board
    }

    pub fn to_fen(&self) -> String {
        let mut squares = [None; 64];
        for (index, slot) in squares.iter_mut().enumerate() {
            let sq = Square::from_index_masked(index as u32);
            *slot = self.piece_at(sq).zip(self.color_at(sq));
        }
        Fen {
            squares,
            side_to_move: self.side,
            castling: self.castle,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove,
            fullmove_number: self.fullmove,
        }
        .to_fen()
    }

    #[inline]
    pub fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    #[inline]
    pub fn occupied_by(&self, color: Color) -> Bitboard {
        self.occupied[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.occupied[0] | self.occupied[1]
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index()]
    }

    #[inline]
    pub fn color_at(&self, sq: Square) -> Option<Color> {
        if self.occupied[0].contains(sq) {
            Some(Color::White)
        } else if self.occupied[1].contains(sq) {
            Some(Color::Black)
        } else {
            None
        }
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side
    }

    #[inline]
    pub fn castle_rights(&self) -> u8 {
        self.castle
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    pub fn pawn_key(&self) -> u32 {
        self.pawn_key
    }

    /// Material of `color` in centipawns, kings excluded.
    #[inline]
    pub fn material(&self, color: Color) -> i32 {
        self.material[color.index()]
    }

    /// Non-pawn material of `color` in phase units (N/B 1, R 2, Q 4).
    #[inline]
    pub fn non_pawn_material(&self, color: Color) -> u8 {
        self.non_pawn[color.index()]
    }

    #[inline]
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        self.non_pawn[color.index()] > 0
    }

    /// Non-pawn material of both sides, capped at [`MAX_PHASE`].
    #[inline]
    pub fn endgame_counter(&self) -> u8 {
        (self.non_pawn[0] + self.non_pawn[1]).min(MAX_PHASE)
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        self.pieces(color, Piece::King)
            .lsb()
            .unwrap_or(Square::A1)
    }

    /// Pieces of `by` attacking `sq`.
    #[inline]
    pub fn attackers(&self, sq: Square, by: Color) -> Bitboard {
        attack_map(self, self.occupied(), sq) & self.occupied_by(by)
    }

    /// Whether `by` attacks `sq`. Cheaper than [`Board::attackers`] when only a yes/no is needed.
    pub fn is_attacked(&self, sq: Square, by: Color) -> bool {
        let occ = self.occupied();
        let rooks = self.pieces(by, Piece::Rook) | self.pieces(by, Piece::Queen);
        let bishops = self.pieces(by, Piece::Bishop) | self.pieces(by, Piece::Queen);
        (pawn_attacks(sq, by.opposite()) & self.pieces(by, Piece::Pawn)).any()
            || (knight_attacks(sq) & self.pieces(by, Piece::Knight)).any()
            || (king_attacks(sq) & self.pieces(by, Piece::King)).any()
            || (rook_attacks(sq, occ) & rooks).any()
            || (bishop_attacks(sq, occ) & bishops).any()
    }

    /// Enemy pieces giving check to the side to move.
    #[inline]
    pub fn checkers(&self) -> Bitboard {
        self.attackers(self.king_square(self.side), self.side.opposite())
    }

    #[inline]
    pub fn in_check(&self) -> bool {
        self.is_attacked(self.king_square(self.side), self.side.opposite())
    }

    /// A pawn capturing a pawn onto the current en-passant square.
    #[inline]
    pub fn is_en_passant(&self, mv: Move) -> bool {
        mv.piece() == Piece::Pawn
            && mv.captured() == Some(Piece::Pawn)
            && self.en_passant == Some(mv.to())
    }

    /// A pawn of `capturer` stands ready to take en passant on `target`.
    fn ep_capturable(&self, target: Square, capturer: Color) -> bool {
        (pawn_attacks(target, capturer.opposite()) & self.pieces(capturer, Piece::Pawn)).any()
    }

    fn set_piece(&mut self, color: Color, piece: Piece, sq: Square) {
        let c = color.index();
        self.pieces[c][piece.index()].add(sq);
        self.occupied[c].add(sq);
        self.squares[sq.index()] = Some(piece);
        self.material[c] += piece.value();
        self.non_pawn[c] += piece.phase_weight();
    }

    fn clear_piece(&mut self, color: Color, piece: Piece, sq: Square) {
        let c = color.index();
        self.pieces[c][piece.index()].clear(sq);
        self.occupied[c].clear(sq);
        self.squares[sq.index()] = None;
        self.material[c] -= piece.value();
        self.non_pawn[c] -= piece.phase_weight();
    }

    fn put(&mut self, color: Color, piece: Piece, sq: Square) {
        self.set_piece(color, piece, sq);
        self.key ^= ZOBRIST.piece(color, piece, sq);
        if piece == Piece::Pawn {
            self.pawn_key ^= ZOBRIST.pawn(color, sq);
        }
    }

    fn take(&mut self, color: Color, piece: Piece, sq: Square) {
        self.clear_piece(color, piece, sq);
        self.key ^= ZOBRIST.piece(color, piece, sq);
        if piece == Piece::Pawn {
            self.pawn_key ^= ZOBRIST.pawn(color, sq);
        }
    }

    fn memento(&self) -> Memento {
        Memento {
            key: self.key,
            pawn_key: self.pawn_key,
            castle: self.castle,
            en_passant: self.en_passant,
            halfmove: self.halfmove,
        }
    }

    fn restore(&mut self, memento: Memento) {
        self.key = memento.key;
        self.pawn_key = memento.pawn_key;
        self.castle = memento.castle;
        self.en_passant = memento.en_passant;
        self.halfmove = memento.halfmove;
    }

    /// Plays a pseudo-legal move. The caller checks legality.
    pub fn make(&mut self, mv: Move) -> Memento {
        let memento = self.memento();
        let us = self.side;
        let them = us.opposite();
        let (from, to) = (mv.from(), mv.to());
        let piece = mv.piece();

        self.key ^= ZOBRIST.castle(self.castle);
        if let Some(ep) = self.en_passant {
            self.key ^= ZOBRIST.en_passant(ep);
        }
        self.halfmove += 1;

        if let Some(victim) = mv.captured() {
            let at = if memento.en_passant == Some(to) && piece == Piece::Pawn {
                to.offset(-us.push_offset())
            } else {
                to
            };
            self.take(them, victim, at);
            self.halfmove = 0;
        }

        self.take(us, piece, from);
        self.put(us, mv.promoted().unwrap_or(piece), to);

        self.en_passant = None;
        if piece == Piece::Pawn {
            self.halfmove = 0;
            if mv.is_double_push() {
                let target = from.offset(us.push_offset());
                if self.ep_capturable(target, them) {
                    self.en_passant = Some(target);
                    self.key ^= ZOBRIST.en_passant(target);
                }
            }
        } else if mv.is_castle() {
            if let Some((rook_from, rook_to)) = castle_rook(to) {
                self.take(us, Piece::Rook, rook_from);
                self.put(us, Piece::Rook, rook_to);
            }
        }

        self.castle &= CASTLE_MASK[from.index()] & CASTLE_MASK[to.index()];
        self.key ^= ZOBRIST.castle(self.castle);

        self.side = them;
        self.key ^= ZOBRIST.side();
        if us == Color::Black {
            self.fullmove += 1;
        }
        memento
    }

    /// Reverts `mv`, which must be the last move made, using its memento.
    pub fn unmake(&mut self, mv: Move, memento: Memento) {
        let us = self.side.opposite();
        let them = self.side;
        let (from, to) = (mv.from(), mv.to());
        let piece = mv.piece();
        self.side = us;
        if us == Color::Black {
            self.fullmove -= 1;
        }

        if mv.is_castle() {
            if let Some((rook_from, rook_to)) = castle_rook(to) {
                self.clear_piece(us, Piece::Rook, rook_to);
                self.set_piece(us, Piece::Rook, rook_from);
            }
        }

        self.clear_piece(us, mv.promoted().unwrap_or(piece), to);
        self.set_piece(us, piece, from);

        if let Some(victim) = mv.captured() {
            let at = if memento.en_passant == Some(to) && piece == Piece::Pawn {
                to.offset(-us.push_offset())
            } else {
                to
            };
            self.set_piece(them, victim, at);
        }

        self.restore(memento);
    }

    /// Passes the move to the opponent.
    pub fn make_null(&mut self) -> Memento {
        let memento = self.memento();
        if let Some(ep) = self.en_passant.take() {
            self.key ^= ZOBRIST.en_passant(ep);
        }
        self.halfmove += 1;
        self.side = self.side.opposite();
        self.key ^= ZOBRIST.side();
        memento
    }

    pub fn unmake_null(&mut self, memento: Memento) {
        self.side = self.side.opposite();
        self.restore(memento);
    }

    /// Fast structural check for moves that did not come from the generator,
    /// such as hash-table and killer moves. It confirms the move could be
    /// generated here, including that it answers a check, but leaves pins and
    /// king safety to the legality filter.
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        if mv.is_none() {
            return false;
        }
        let us = self.side;
        let them = us.opposite();
        let (from, to) = (mv.from(), mv.to());
        let piece = mv.piece();
        if from == to
            || self.piece_at(from) != Some(piece)
            || !self.occupied_by(us).contains(from)
            || self.occupied_by(us).contains(to)
        {
            return false;
        }

        let ep = self.is_en_passant(mv);
        match mv.captured() {
            Some(Piece::King) => return false,
            Some(victim) if !ep => {
                if self.piece_at(to) != Some(victim) || !self.occupied_by(them).contains(to) {
                    return false;
                }
            }
            Some(_) => {}
            None => {
                if self.piece_at(to).is_some() {
                    return false;
                }
            }
        }

        let last_rank = to.rank_index() == us.relative_rank(7);
        match mv.promoted() {
            Some(Piece::Pawn) | Some(Piece::King) => return false,
            Some(_) if piece != Piece::Pawn || !last_rank => return false,
            None if piece == Piece::Pawn && last_rank => return false,
            _ => {}
        }

        let occ = self.occupied();
        let reachable = match piece {
            Piece::Pawn => {
                if mv.is_capture() {
                    pawn_attacks(from, us).contains(to)
                } else {
                    let single = from.offset(us.push_offset());
                    to == single
                        || (mv.is_double_push()
                            && from.rank_index() == us.relative_rank(1)
                            && to == single.offset(us.push_offset())
                            && !occ.contains(single))
                }
            }
            Piece::Knight => knight_attacks(from).contains(to),
            Piece::Bishop => bishop_attacks(from, occ).contains(to),
            Piece::Rook => rook_attacks(from, occ).contains(to),
            Piece::Queen => (bishop_attacks(from, occ) | rook_attacks(from, occ)).contains(to),
            Piece::King => {
                if mv.is_castle() {
                    return self.can_castle_to(to);
                }
                king_attacks(from).contains(to)
            }
        };
        if !reachable {
            return false;
        }

        if piece != Piece::King {
            let checkers = self.checkers();
            if checkers.has_several() {
                return false;
            }
            if let Some(checker) = checkers.lsb() {
                let king = self.king_square(us);
                let resolves = to == checker
                    || tables().between(king, checker).contains(to)
                    || (ep && to.offset(-us.push_offset()) == checker);
                if !resolves {
                    return false;
                }
            }
        }
        true
    }

    /// Castling to `king_to` is allowed by rights, empty squares and safe transit.
    pub(crate) fn can_castle_to(&self, king_to: Square) -> bool {
        let us = self.side;
        let them = us.opposite();
        let (right, king_from, transit) = match (us, king_to) {
            (Color::White, Square::G1) => (castle::WHITE_KING, Square::E1, Square::F1),
            (Color::White, Square::C1) => (castle::WHITE_QUEEN, Square::E1, Square::D1),
            (Color::Black, Square::G8) => (castle::BLACK_KING, Square::E8, Square::F8),
            (Color::Black, Square::C8) => (castle::BLACK_QUEEN, Square::E8, Square::D8),
            _ => return false,
        };
        let Some((rook_from, _)) = castle_rook(king_to) else {
            return false;
        };
        self.castle & right != 0
            && (tables().between(king_from, rook_from) & self.occupied()).is_empty()
            && !self.is_attacked(king_from, them)
            && !self.is_attacked(transit, them)
            && !self.is_attacked(king_to, them)
    }

    /// Position key computed from scratch.
    pub fn compute_key(&self) -> u64 {
        let mut key = 0;
        for color in Color::BOTH {
            for piece in Piece::ALL {
                for sq in self.pieces(color, piece) {
                    key ^= ZOBRIST.piece(color, piece, sq);
                }
            }
        }
        key ^= ZOBRIST.castle(self.castle);
        if let Some(ep) = self.en_passant {
            key ^= ZOBRIST.en_passant(ep);
        }
        if self.side == Color::Black {
            key ^= ZOBRIST.side();
        }
        key
    }

    pub fn compute_pawn_key(&self) -> u32 {
        let mut key = 0;
        for color in Color::BOTH {
            for sq in self.pieces(color, Piece::Pawn) {
                key ^= ZOBRIST.pawn(color, sq);
            }
        }
        key
    }

    /// Checks every internal invariant: bitboards, square map, material and keys agree.
    pub fn validate(&self) -> Result<(), BoardError> {
        let mut material = [0; 2];
        let mut non_pawn = [0u8; 2];
        let mut seen = Bitboard::EMPTY;
        for color in Color::BOTH {
            let mut occupied = Bitboard::EMPTY;
            for piece in Piece::ALL {
                let set = self.pieces(color, piece);
                if (set & seen).any() {
                    return Err(BoardError::Corrupt(format!("{color} {piece} overlaps")));
                }
                seen |= set;
                occupied |= set;
                material[color.index()] += piece.value() * set.count() as i32;
                non_pawn[color.index()] += piece.phase_weight() * set.count() as u8;
                for sq in set {
                    if self.piece_at(sq) != Some(piece) {
                        return Err(BoardError::Corrupt(format!("square map disagrees on {sq}")));
                    }
                }
            }
            if occupied != self.occupied_by(color) {
                return Err(BoardError::Corrupt(format!("{color} occupancy")));
            }
            if self.pieces(color, Piece::King).count() != 1 {
                return Err(BoardError::Corrupt(format!("{color} king count")));
            }
        }
        if self.squares.iter().filter(|s| s.is_some()).count() != seen.count() as usize {
            return Err(BoardError::Corrupt("stray square map entry".to_string()));
        }
        if material != self.material || non_pawn != self.non_pawn {
            return Err(BoardError::Corrupt("material".to_string()));
        }
        if self.key != self.compute_key() || self.pawn_key != self.compute_pawn_key() {
            return Err(BoardError::Corrupt("zobrist key".to_string()));
        }
        Ok(())
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::startpos()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8u8).rev() {
            for file in 0..8u8 {
                let sq = Square::from_index_masked(u32::from(rank * 8 + file));
                let c = match (self.piece_at(sq), self.color_at(sq)) {
                    (Some(piece), Some(color)) => piece.to_fen_char(color),
                    _ => '.',
                };
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        write!(f, "{}", self.to_fen())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.to_fen())
    }
}
