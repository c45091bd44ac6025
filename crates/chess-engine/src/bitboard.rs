//! 64-bit square sets.
//!
//! Bit `n` stands for the square with index `n` (a1 = 0, h8 = 63).

use chess_core::{Color, Square};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not};

/// A set of squares.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bitboard(pub u64);

impl Bitboard {
    pub const EMPTY: Bitboard = Bitboard(0);
    pub const FULL: Bitboard = Bitboard(!0);

    pub const FILE_A: Bitboard = Bitboard(0x0101_0101_0101_0101);
    pub const FILE_H: Bitboard = Bitboard(0x8080_8080_8080_8080);
    pub const RANK_1: Bitboard = Bitboard(0x0000_0000_0000_00FF);
    pub const RANK_2: Bitboard = Bitboard(0x0000_0000_0000_FF00);
    pub const RANK_3: Bitboard = Bitboard(0x0000_0000_00FF_0000);
    pub const RANK_6: Bitboard = Bitboard(0x0000_FF00_0000_0000);
    pub const RANK_7: Bitboard = Bitboard(0x00FF_0000_0000_0000);
    pub const RANK_8: Bitboard = Bitboard(0xFF00_0000_0000_0000);

    #[inline]
    pub const fn from_square(sq: Square) -> Self {
        Bitboard(sq.bit())
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn any(self) -> bool {
        self.0 != 0
    }

    /// More than one square set.
    #[inline]
    pub const fn has_several(self) -> bool {
        self.0 & self.0.wrapping_sub(1) != 0
    }

    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub const fn contains(self, sq: Square) -> bool {
        self.0 & sq.bit() != 0
    }

    #[inline]
    pub fn add(&mut self, sq: Square) {
        self.0 |= sq.bit();
    }

    #[inline]
    pub fn clear(&mut self, sq: Square) {
        self.0 &= !sq.bit();
    }

    #[inline]
    pub fn toggle(&mut self, sq: Square) {
        self.0 ^= sq.bit();
    }

    #[inline]
    pub const fn with(self, sq: Square) -> Self {
        Bitboard(self.0 | sq.bit())
    }

    #[inline]
    pub const fn without(self, sq: Square) -> Self {
        Bitboard(self.0 & !sq.bit())
    }

    /// Lowest set square.
    #[inline]
    pub const fn lsb(self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            Some(Square::from_index_masked(self.0.trailing_zeros()))
        }
    }

    /// Highest set square.
    #[inline]
    pub const fn msb(self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            Some(Square::from_index_masked(63 - self.0.leading_zeros()))
        }
    }

    #[inline]
    pub fn pop_lsb(&mut self) -> Option<Square> {
        let sq = self.lsb()?;
        self.0 &= self.0 - 1;
        Some(sq)
    }

    #[inline]
    pub fn pop_msb(&mut self) -> Option<Square> {
        let sq = self.msb()?;
        self.0 ^= sq.bit();
        Some(sq)
    }

    /// The set square furthest up the board from `side`'s point of view.
    #[inline]
    pub const fn furthest_forward(self, side: Color) -> Option<Square> {
        match side {
            Color::White => self.msb(),
            Color::Black => self.lsb(),
        }
    }

    /// The set square closest to `side`'s home rank.
    #[inline]
    pub const fn rearmost(self, side: Color) -> Option<Square> {
        match side {
            Color::White => self.lsb(),
            Color::Black => self.msb(),
        }
    }

    #[inline]
    pub const fn north(self) -> Self {
        Bitboard(self.0 << 8)
    }

    #[inline]
    pub const fn south(self) -> Self {
        Bitboard(self.0 >> 8)
    }

    #[inline]
    pub const fn east(self) -> Self {
        Bitboard((self.0 << 1) & !Self::FILE_A.0)
    }

    #[inline]
    pub const fn west(self) -> Self {
        Bitboard((self.0 >> 1) & !Self::FILE_H.0)
    }

    /// One rank towards the opponent of `side`.
    #[inline]
    pub const fn forward(self, side: Color) -> Self {
        match side {
            Color::White => self.north(),
            Color::Black => self.south(),
        }
    }

    /// Squares attacked towards the a-file by pawns of `side` standing on this set.
    #[inline]
    pub const fn pawn_attacks_west(self, side: Color) -> Self {
        self.forward(side).west()
    }

    /// Squares attacked towards the h-file by pawns of `side` standing on this set.
    #[inline]
    pub const fn pawn_attacks_east(self, side: Color) -> Self {
        self.forward(side).east()
    }

    /// Iterates from `side`'s back rank outward.
    #[inline]
    pub fn iter_from(self, side: Color) -> impl Iterator<Item = Square> {
        let mut rest = self;
        std::iter::from_fn(move || match side {
            Color::White => rest.pop_lsb(),
            Color::Black => rest.pop_msb(),
        })
    }
}

impl BitAnd for Bitboard {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Bitboard(self.0 & rhs.0)
    }
}

impl BitAndAssign for Bitboard {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for Bitboard {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Bitboard(self.0 | rhs.0)
    }
}

impl BitOrAssign for Bitboard {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitXor for Bitboard {
    type Output = Self;
    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Bitboard(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Bitboard {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl Not for Bitboard {
    type Output = Self;
    #[inline]
    fn not(self) -> Self {
        Bitboard(!self.0)
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bitboard({:#018x})", self.0)?;
        for rank in (0..8u8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8u8 {
                let mark = if self.0 >> (rank * 8 + file) & 1 == 1 { 'X' } else { '.' };
                write!(f, "{mark} ")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")
    }
}

/// Iterator over the squares of a set, lowest index first.
pub struct Squares(Bitboard);

impl Iterator for Squares {
    type Item = Square;

    #[inline]
    fn next(&mut self) -> Option<Square> {
        self.0.pop_lsb()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Squares {}

impl IntoIterator for Bitboard {
    type Item = Square;
    type IntoIter = Squares;

    #[inline]
    fn into_iter(self) -> Squares {
        Squares(self)
    }
}

impl FromIterator<Square> for Bitboard {
    fn from_iter<I: IntoIterator<Item = Square>>(iter: I) -> Self {
        iter.into_iter().fold(Bitboard::EMPTY, Bitboard::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn lsb_and_msb() {
        let bb: Bitboard = [sq("c2"), sq("f7")].into_iter().collect();
        assert_eq!(bb.lsb(), Some(sq("c2")));
        assert_eq!(bb.msb(), Some(sq("f7")));
        assert_eq!(Bitboard::EMPTY.lsb(), None);
        assert_eq!(Bitboard::EMPTY.msb(), None);
    }

    #[test]
    fn furthest_forward_depends_on_side() {
        let bb: Bitboard = [sq("a3"), sq("a6")].into_iter().collect();
        assert_eq!(bb.furthest_forward(Color::White), Some(sq("a6")));
        assert_eq!(bb.furthest_forward(Color::Black), Some(sq("a3")));
        assert_eq!(bb.rearmost(Color::White), Some(sq("a3")));
    }

    #[test]
    fn pops_drain_the_set() {
        let mut bb = Bitboard(0b1010);
        assert_eq!(bb.pop_lsb().map(|s| s.index()), Some(1));
        assert_eq!(bb.pop_msb().map(|s| s.index()), Some(3));
        assert_eq!(bb.pop_lsb(), None);
        assert_eq!(bb.pop_msb(), None);
    }

    #[test]
    fn shifts_do_not_wrap_files() {
        let h4 = Bitboard::from_square(sq("h4"));
        assert!(h4.east().is_empty());
        let a4 = Bitboard::from_square(sq("a4"));
        assert!(a4.west().is_empty());
        assert_eq!(a4.pawn_attacks_east(Color::White), Bitboard::from_square(sq("b5")));
        assert_eq!(a4.pawn_attacks_east(Color::Black), Bitboard::from_square(sq("b3")));
    }

    #[test]
    fn several() {
        assert!(!Bitboard::EMPTY.has_several());
        assert!(!Bitboard::from_square(sq("d4")).has_several());
        assert!(Bitboard::RANK_1.has_several());
    }

    #[test]
    fn black_iterates_from_rank_eight() {
        let order: Vec<Square> = Bitboard::FILE_A.iter_from(Color::Black).collect();
        assert_eq!(order.first(), Some(&Square::A8));
        assert_eq!(order.last(), Some(&Square::A1));
        assert_eq!(Bitboard::FILE_A.into_iter().len(), 8);
    }
}
