//! Geometry tables computed once at start-up.
//!
//! Rays, the direction between two squares, the squares strictly between
//! two aligned squares, king zones and the pawn-structure masks used by the
//! evaluator.

use crate::Bitboard;
use chess_core::{Color, Square};
use std::sync::OnceLock;

/// The eight compass directions. Even values are orthogonal, odd values diagonal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// `(file, rank)` step.
    pub const fn step(self) -> (i8, i8) {
        match self {
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, -1),
            Direction::South => (0, -1),
            Direction::SouthWest => (-1, -1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, 1),
        }
    }

    #[inline]
    pub const fn is_diagonal(self) -> bool {
        self as u8 & 1 == 1
    }

    /// Rays in this direction run towards higher square indices.
    #[inline]
    pub const fn is_increasing(self) -> bool {
        matches!(
            self,
            Direction::North | Direction::NorthEast | Direction::East | Direction::NorthWest
        )
    }
}

pub struct Tables {
    rays: [[Bitboard; 64]; 8],
    direction: [[Option<Direction>; 64]; 64],
    between: [[Bitboard; 64]; 64],
    line: [[Bitboard; 64]; 64],
    king_zone: [[Bitboard; 64]; 2],
    king_shield: [[Bitboard; 64]; 2],
    front_span: [[Bitboard; 64]; 2],
    passed: [[Bitboard; 64]; 2],
    attack_span: [[Bitboard; 64]; 2],
    back_span: [[Bitboard; 64]; 2],
    isolated: [Bitboard; 8],
}

static TABLES: OnceLock<Box<Tables>> = OnceLock::new();

/// The shared geometry tables.
#[inline]
pub fn tables() -> &'static Tables {
    TABLES.get_or_init(Tables::build)
}

#[inline]
pub const fn file_mask(file: u8) -> Bitboard {
    Bitboard(Bitboard::FILE_A.0 << (file & 7))
}

#[inline]
pub const fn rank_mask(rank: u8) -> Bitboard {
    Bitboard(Bitboard::RANK_1.0 << (8 * (rank & 7)))
}

/// Files on either side of `file`, not including it.
const fn adjacent_files(file: u8) -> Bitboard {
    let mut bits = 0;
    if file > 0 {
        bits |= file_mask(file - 1).0;
    }
    if file < 7 {
        bits |= file_mask(file + 1).0;
    }
    Bitboard(bits)
}

/// Ranks strictly in front of `rank` from `side`'s point of view.
const fn ranks_ahead(side: Color, rank: u8) -> Bitboard {
    match side {
        Color::White => {
            if rank >= 7 {
                Bitboard::EMPTY
            } else {
                Bitboard(!0u64 << (8 * (rank + 1)))
            }
        }
        Color::Black => Bitboard((1u64 << (8 * rank)) - 1),
    }
}

impl Tables {
    fn build() -> Box<Tables> {
        let mut t = Box::new(Tables {
            rays: [[Bitboard::EMPTY; 64]; 8],
            direction: [[None; 64]; 64],
            between: [[Bitboard::EMPTY; 64]; 64],
            line: [[Bitboard::EMPTY; 64]; 64],
            king_zone: [[Bitboard::EMPTY; 64]; 2],
            king_shield: [[Bitboard::EMPTY; 64]; 2],
            front_span: [[Bitboard::EMPTY; 64]; 2],
            passed: [[Bitboard::EMPTY; 64]; 2],
            attack_span: [[Bitboard::EMPTY; 64]; 2],
            back_span: [[Bitboard::EMPTY; 64]; 2],
            isolated: [Bitboard::EMPTY; 8],
        });

        for from in 0..64u32 {
            let origin = Square::from_index_masked(from);
            for dir in Direction::ALL {
                let (df, dr) = dir.step();
                let mut f = origin.file_index() as i8 + df;
                let mut r = origin.rank_index() as i8 + dr;
                let mut walked = Bitboard::EMPTY;
                while let Some(to) = Square::from_coords(f, r) {
                    t.direction[origin.index()][to.index()] = Some(dir);
                    t.between[origin.index()][to.index()] = walked;
                    walked.add(to);
                    f += df;
                    r += dr;
                }
                t.rays[dir as usize][origin.index()] = walked;
            }
        }

        for a in 0..64 {
            for b in 0..64 {
                if let Some(dir) = t.direction[a][b] {
                    let opposite = Direction::ALL[(dir as usize + 4) & 7];
                    t.line[a][b] = t.rays[dir as usize][a]
                        | t.rays[opposite as usize][a]
                        | Bitboard(1u64 << a);
                }
            }
        }

        for file in 0..8u8 {
            t.isolated[file as usize] = adjacent_files(file);
        }

        for side in Color::BOTH {
            let s = side.index();
            for index in 0..64u32 {
                let sq = Square::from_index_masked(index);
                let i = sq.index();
                let file = sq.file_index();
                let ahead = ranks_ahead(side, sq.rank_index());
                let own_file = file_mask(file);
                let wings = adjacent_files(file);

                t.front_span[s][i] = ahead & own_file;
                t.attack_span[s][i] = ahead & wings;
                t.passed[s][i] = ahead & (own_file | wings);
                // Own rank included: a pawn level with its neighbour is not backward.
                t.back_span[s][i] = wings & !ahead;

                let king = Bitboard::from_square(sq);
                let around = crate::movegen::king_attacks(sq) | king;
                t.king_zone[s][i] = around | around.forward(side);
                let front = king.forward(side);
                let front = front | front.east() | front.west();
                t.king_shield[s][i] = front | front.forward(side);
            }
        }
        t
    }

    /// Squares from `sq` (exclusive) to the board edge in `dir`.
    #[inline]
    pub fn ray(&self, dir: Direction, sq: Square) -> Bitboard {
        self.rays[dir as usize][sq.index()]
    }

    /// Direction from `from` towards `to`, `None` when not on a common line.
    #[inline]
    pub fn direction(&self, from: Square, to: Square) -> Option<Direction> {
        self.direction[from.index()][to.index()]
    }

    /// Squares strictly between two aligned squares, empty otherwise.
    #[inline]
    pub fn between(&self, a: Square, b: Square) -> Bitboard {
        self.between[a.index()][b.index()]
    }

    /// The full board-edge-to-edge line through two aligned squares, empty otherwise.
    #[inline]
    pub fn line(&self, a: Square, b: Square) -> Bitboard {
        self.line[a.index()][b.index()]
    }

    #[inline]
    pub fn king_zone(&self, side: Color, sq: Square) -> Bitboard {
        self.king_zone[side.index()][sq.index()]
    }

    #[inline]
    pub fn king_shield(&self, side: Color, sq: Square) -> Bitboard {
        self.king_shield[side.index()][sq.index()]
    }

    /// Squares in front of a pawn on its own file.
    #[inline]
    pub fn front_span(&self, side: Color, sq: Square) -> Bitboard {
        self.front_span[side.index()][sq.index()]
    }

    /// Squares an enemy pawn must not occupy for a pawn to be passed.
    #[inline]
    pub fn passed(&self, side: Color, sq: Square) -> Bitboard {
        self.passed[side.index()][sq.index()]
    }

    /// Squares on adjacent files ahead of a pawn.
    #[inline]
    pub fn attack_span(&self, side: Color, sq: Square) -> Bitboard {
        self.attack_span[side.index()][sq.index()]
    }

    /// Squares on adjacent files level with or behind a pawn.
    #[inline]
    pub fn back_span(&self, side: Color, sq: Square) -> Bitboard {
        self.back_span[side.index()][sq.index()]
    }

    #[inline]
    pub fn isolated(&self, file: u8) -> Bitboard {
        self.isolated[(file & 7) as usize]
    }
}
