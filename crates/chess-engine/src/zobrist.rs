//! Zobrist keys.
//!
//! The position key is the XOR of one key per (side, piece, square), the
//! castle key for the current 4-bit rights, the en-passant file key when a
//! capture is possible, and the side key when black is to move. The 32-bit
//! pawn key is the XOR of the upper halves of the pawn keys alone.

use chess_core::{Color, Piece, Square};

pub struct ZobristKeys {
    pieces: [[[u64; 64]; 6]; 2],
    side: u64,
    castle: [u64; 16],
    en_passant: [u64; 8],
}

/// xorshift64 step.
const fn next(state: u64) -> u64 {
    let mut x = state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

impl ZobristKeys {
    const fn generate() -> Self {
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        let mut pieces = [[[0u64; 64]; 6]; 2];
        let mut side = 0;
        while side < 2 {
            let mut piece = 0;
            while piece < 6 {
                let mut sq = 0;
                while sq < 64 {
                    state = next(state);
                    pieces[side][piece][sq] = state;
                    sq += 1;
                }
                piece += 1;
            }
            side += 1;
        }

        state = next(state);
        let side_key = state;

        // Keys for the four single rights; combined states XOR them together.
        let mut rights = [0u64; 4];
        let mut i = 0;
        while i < 4 {
            state = next(state);
            rights[i] = state;
            i += 1;
        }
        let mut castle = [0u64; 16];
        let mut bits = 0;
        while bits < 16 {
            let mut key = 0;
            let mut r = 0;
            while r < 4 {
                if bits & (1 << r) != 0 {
                    key ^= rights[r];
                }
                r += 1;
            }
            castle[bits] = key;
            bits += 1;
        }

        let mut en_passant = [0u64; 8];
        let mut file = 0;
        while file < 8 {
            state = next(state);
            en_passant[file] = state;
            file += 1;
        }

        ZobristKeys {
            pieces,
            side: side_key,
            castle,
            en_passant,
        }
    }

    #[inline]
    pub const fn piece(&self, color: Color, piece: Piece, sq: Square) -> u64 {
        self.pieces[color.index()][piece.index()][sq.index()]
    }

    /// Pawn-structure key contribution of a pawn.
    #[inline]
    pub const fn pawn(&self, color: Color, sq: Square) -> u32 {
        (self.pieces[color.index()][Piece::Pawn.index()][sq.index()] >> 32) as u32
    }

    #[inline]
    pub const fn side(&self) -> u64 {
        self.side
    }

    /// Key for a full castle-rights state; zero when no rights remain.
    #[inline]
    pub const fn castle(&self, rights: u8) -> u64 {
        self.castle[(rights & 15) as usize]
    }

    #[inline]
    pub const fn en_passant(&self, sq: Square) -> u64 {
        self.en_passant[sq.file_index() as usize]
    }
}

pub static ZOBRIST: ZobristKeys = ZobristKeys::generate();
