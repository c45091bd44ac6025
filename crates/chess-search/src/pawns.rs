//! Pawn-structure evaluation and its per-worker cache.
//!
//! Pawn structure changes far less often than the rest of the position, so
//! its score is keyed by the board's 32-bit pawn key and kept in a small
//! direct-mapped table. Each worker owns one; nothing here is shared.

use chess_core::{Color, Piece, Square};
use chess_engine::{tables, Bitboard, Board};

const CACHE_SIZE: usize = 1 << 14;

/// Pawn placement, a8 first from white's point of view.
#[rustfmt::skip]
pub(crate) const PAWN_PST: [i32; 64] = [
     0,  0,   0,   0,   0,   0,  0,  0,
    50, 50,  50,  50,  50,  50, 50, 50,
    10, 10,  20,  30,  30,  20, 10, 10,
     5,  5,  10,  25,  25,  10,  5,  5,
     0,  0,   0,  20,  20,   0,  0,  0,
     5, -5, -10,   0,   0, -10, -5,  5,
     5, 10,  10, -20, -20,  10, 10,  5,
     0,  0,   0,   0,   0,   0,  0,  0,
];

/// Endgame bonus for advancement, by relative rank.
const ADVANCE_EG: [i32; 8] = [0, 0, 4, 8, 14, 22, 34, 0];
const PASSED_MG: [i32; 8] = [0, 5, 10, 15, 25, 40, 60, 0];
const PASSED_EG: [i32; 8] = [0, 10, 20, 35, 60, 100, 150, 0];

const DEFENDED: i32 = 5;
const DUO: i32 = 4;
const DOUBLED: i32 = -12;
const ISOLATED: i32 = -10;
const BACKWARD: i32 = -8;

/// Index into an a8-first table for a piece of `side` on `sq`.
#[inline]
pub(crate) fn pst_index(side: Color, sq: Square) -> usize {
    match side {
        Color::White => sq.index() ^ 56,
        Color::Black => sq.index(),
    }
}

/// Everything the evaluator needs to know about one pawn structure.
///
/// Scores are from each side's own point of view; the evaluator takes the
/// difference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PawnEntry {
    key: u32,
    pub attacks_west: [Bitboard; 2],
    pub attacks_east: [Bitboard; 2],
    pub attacks: [Bitboard; 2],
    pub count: [u8; 2],
    pub passed: [Bitboard; 2],
    pub mg: [i32; 2],
    pub eg: [i32; 2],
}

impl PawnEntry {
    fn compute(board: &Board) -> Self {
        let t = tables();
        let mut entry = PawnEntry {
            key: board.pawn_key(),
            ..PawnEntry::default()
        };

        for side in Color::BOTH {
            let s = side.index();
            let pawns = board.pieces(side, Piece::Pawn);
            entry.attacks_west[s] = pawns.pawn_attacks_west(side);
            entry.attacks_east[s] = pawns.pawn_attacks_east(side);
            entry.attacks[s] = entry.attacks_west[s] | entry.attacks_east[s];
            entry.count[s] = pawns.count() as u8;
        }

        for side in Color::BOTH {
            let s = side.index();
            let them = side.opposite();
            let own = board.pieces(side, Piece::Pawn);
            let enemy = board.pieces(them, Piece::Pawn);
            let (mut mg, mut eg) = (0, 0);

            for sq in own {
                let rank = side.relative_rank(sq.rank_index()) as usize;
                let here = Bitboard::from_square(sq);
                mg += PAWN_PST[pst_index(side, sq)];
                eg += ADVANCE_EG[rank];

                if entry.attacks[s].contains(sq) {
                    mg += DEFENDED;
                    eg += DEFENDED;
                }
                if ((here.east() | here.west()) & own).any() {
                    mg += DUO;
                    eg += DUO;
                }
                if (t.front_span(side, sq) & own).any() {
                    mg += DOUBLED;
                    eg += DOUBLED;
                }

                let passed = (t.passed(side, sq) & enemy).is_empty();
                if passed {
                    entry.passed[s].add(sq);
                    mg += PASSED_MG[rank];
                    eg += PASSED_EG[rank];
                } else if (t.isolated(sq.file_index()) & own).is_empty() {
                    mg += ISOLATED;
                    eg += ISOLATED;
                }

                let stop = here.forward(side);
                let supported = (t.back_span(side, sq) & own).any();
                if !passed && !supported && (stop & entry.attacks[them.index()]).any() {
                    mg += BACKWARD;
                    eg += BACKWARD;
                }
            }
            entry.mg[s] = mg;
            entry.eg[s] = eg;
        }
        entry
    }
}

/// Direct-mapped pawn hash. An all-zero slot is already the correct entry
/// for the pawnless key 0, so the table needs no validity flag.
pub struct PawnCache {
    entries: Box<[PawnEntry]>,
}

impl PawnCache {
    pub fn new() -> Self {
        PawnCache {
            entries: vec![PawnEntry::default(); CACHE_SIZE].into_boxed_slice(),
        }
    }

    /// The pawn structure of `board`, computed on a miss.
    pub fn probe(&mut self, board: &Board) -> &PawnEntry {
        let key = board.pawn_key();
        let slot = key as usize & (CACHE_SIZE - 1);
        if self.entries[slot].key != key {
            self.entries[slot] = PawnEntry::compute(board);
        }
        &self.entries[slot]
    }

    pub fn clear(&mut self) {
        self.entries.fill(PawnEntry::default());
    }
}

impl Default for PawnCache {
    fn default() -> Self {
        Self::new()
    }
}
