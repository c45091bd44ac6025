//! Magic bitboards for sliding-piece attacks.
//!
//! For each square the relevant-occupancy mask is multiplied by a magic
//! number and shifted right by `64 - popcount(mask)`, giving a dense index
//! into that square's slice of a shared attack table. The magics are found
//! at start-up by trial with a fixed-seed PRNG, so every run builds the same
//! tables.

use crate::Bitboard;
use chess_core::Square;
use std::sync::OnceLock;

const ROOK_DIRECTIONS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

/// Per-square lookup parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Magic {
    pub mask: Bitboard,
    pub magic: u64,
    pub shift: u32,
    pub offset: usize,
}

impl Magic {
    #[inline]
    fn index(&self, occupied: Bitboard) -> usize {
        self.offset + ((occupied.0 & self.mask.0).wrapping_mul(self.magic) >> self.shift) as usize
    }
}

/// Magics and attack sets for one slider kind.
pub struct SliderTable {
    magics: [Magic; 64],
    attacks: Vec<Bitboard>,
}

impl SliderTable {
    #[inline]
    pub fn attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.attacks[self.magics[sq.index()].index(occupied)]
    }
}

static ROOK_TABLE: OnceLock<SliderTable> = OnceLock::new();
static BISHOP_TABLE: OnceLock<SliderTable> = OnceLock::new();

pub fn rook_table() -> &'static SliderTable {
    ROOK_TABLE.get_or_init(|| build_table(&ROOK_DIRECTIONS, 0x2545_F491_4F6C_DD1D))
}

pub fn bishop_table() -> &'static SliderTable {
    BISHOP_TABLE.get_or_init(|| build_table(&BISHOP_DIRECTIONS, 0x9E37_79B9_7F4A_7C15))
}

/// Forces both tables to be built now rather than on first lookup.
pub fn init() {
    rook_table();
    bishop_table();
}

#[inline]
pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    rook_table().attacks(sq, occupied)
}

#[inline]
pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    bishop_table().attacks(sq, occupied)
}

#[inline]
pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    rook_attacks(sq, occupied) | bishop_attacks(sq, occupied)
}

/// xorshift64, the same generator family the Zobrist keys use.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    /// Candidates with few set bits make good magics far more often.
    fn sparse(&mut self) -> u64 {
        self.next() & self.next() & self.next()
    }
}

fn build_table(directions: &[(i8, i8); 4], seed: u64) -> SliderTable {
    let mut rng = Rng(seed);
    let mut magics = [Magic::default(); 64];
    let mut attacks = Vec::new();

    let mut occupancies = Vec::with_capacity(4096);
    let mut references = Vec::with_capacity(4096);
    let mut claimed: Vec<u32> = Vec::new();
    let mut slots: Vec<Bitboard> = Vec::new();
    let mut attempt = 0u32;

    for (index, magic) in magics.iter_mut().enumerate() {
        let sq = Square::from_index_masked(index as u32);
        let mask = relevant_mask(sq, directions);
        let bits = mask.count();
        let size = 1usize << bits;

        occupancies.clear();
        references.clear();
        // Carry-rippler walk over every subset of the mask.
        let mut subset = 0u64;
        loop {
            occupancies.push(subset);
            references.push(slide(sq, Bitboard(subset), directions));
            subset = subset.wrapping_sub(mask.0) & mask.0;
            if subset == 0 {
                break;
            }
        }

        claimed.clear();
        claimed.resize(size, 0);
        slots.clear();
        slots.resize(size, Bitboard::EMPTY);
        let shift = 64 - bits;

        let found = loop {
            let candidate = rng.sparse();
            if (mask.0.wrapping_mul(candidate) >> 56).count_ones() < 6 {
                continue;
            }
            attempt += 1;
            let mut ok = true;
            for (occ, reference) in occupancies.iter().zip(&references) {
                let slot = (occ.wrapping_mul(candidate) >> shift) as usize;
                if claimed[slot] != attempt {
                    claimed[slot] = attempt;
                    slots[slot] = *reference;
                } else if slots[slot] != *reference {
                    ok = false;
                    break;
                }
            }
            if ok {
                break candidate;
            }
        };

        *magic = Magic {
            mask,
            magic: found,
            shift,
            offset: attacks.len(),
        };
        attacks.extend_from_slice(&slots);
    }

    SliderTable { magics, attacks }
}

/// Squares whose occupancy can change the attack set: the rays minus their last square.
fn relevant_mask(sq: Square, directions: &[(i8, i8); 4]) -> Bitboard {
    let mut mask = Bitboard::EMPTY;
    for &(df, dr) in directions {
        let mut f = sq.file_index() as i8 + df;
        let mut r = sq.rank_index() as i8 + dr;
        while Square::from_coords(f + df, r + dr).is_some() {
            if let Some(s) = Square::from_coords(f, r) {
                mask.add(s);
            }
            f += df;
            r += dr;
        }
    }
    mask
}

/// Ray-walking attack generation, used to fill the tables and in tests.
pub fn slide(sq: Square, occupied: Bitboard, directions: &[(i8, i8); 4]) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    for &(df, dr) in directions {
        let mut f = sq.file_index() as i8 + df;
        let mut r = sq.rank_index() as i8 + dr;
        while let Some(s) = Square::from_coords(f, r) {
            attacks.add(s);
            if occupied.contains(s) {
                break;
            }
            f += df;
            r += dr;
        }
    }
    attacks
}
