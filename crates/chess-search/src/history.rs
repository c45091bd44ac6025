//! Shared history heuristic.
//!
//! One counter per (side, piece, destination). A quiet move that causes a
//! beta cutoff adds a quarter of the nodes its subtree took, so cutoffs near
//! the root count for more than cutoffs near the leaves.

use chess_core::{Color, Move, Piece, Square};
use parking_lot::Mutex;

/// Bits of a counter that reach the sort key.
const KEY_MASK: u64 = (1 << 21) - 1;

type Counters = [[[u64; 64]; 6]; 2];

pub struct HistoryTable {
    counters: Mutex<Box<Counters>>,
}

impl HistoryTable {
    pub fn new() -> Self {
        HistoryTable {
            counters: Mutex::new(Box::new([[[0; 64]; 6]; 2])),
        }
    }

    /// Credits a quiet move that refuted a node after searching `nodes` nodes.
    pub fn update(&self, side: Color, mv: Move, nodes: u64) {
        let mut counters = self.counters.lock();
        let counter = &mut counters[side.index()][mv.piece().index()][mv.to().index()];
        *counter = counter.saturating_add((nodes >> 2) | 1);
    }

    /// Sort-key contribution for `piece` moving to `to`: an even value in bits 1..=21.
    pub fn probe(&self, side: Color, piece: Piece, to: Square) -> u64 {
        let counters = self.counters.lock();
        key_of(counters[side.index()][piece.index()][to.index()])
    }

    /// Scores a batch of moves under one lock, adding to their current keys.
    pub fn score_moves(&self, side: Color, moves: &mut [chess_engine::ScoredMove]) {
        let counters = self.counters.lock();
        for entry in moves {
            let mv = entry.mv;
            entry.key |= key_of(counters[side.index()][mv.piece().index()][mv.to().index()]);
        }
    }

    /// Halves every counter so older cutoffs fade.
    pub fn decay(&self) {
        let mut counters = self.counters.lock();
        counters.iter_mut().flatten().flatten().for_each(|c| *c >>= 1);
    }

    pub fn clear(&self) {
        let mut counters = self.counters.lock();
        counters.iter_mut().flatten().flatten().for_each(|c| *c = 0);
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn key_of(counter: u64) -> u64 {
    (((counter >> 3) & KEY_MASK) | 1) << 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_engine::ScoredMove;

    fn quiet(from: &str, to: &str, piece: Piece) -> Move {
        Move::new(
            Square::from_algebraic(from).unwrap(),
            Square::from_algebraic(to).unwrap(),
            piece,
            None,
            None,
        )
    }

    #[test]
    fn unseen_moves_score_two() {
        let history = HistoryTable::new();
        assert_eq!(history.probe(Color::White, Piece::Knight, Square::A1), 2);
    }

    #[test]
    fn update_and_probe_formula() {
        let history = HistoryTable::new();
        let mv = quiet("g1", "f3", Piece::Knight);
        history.update(Color::White, mv, 1000);
        // counter = (1000 >> 2) | 1 = 251; key = ((251 >> 3) | 1) << 1 = 62
        assert_eq!(history.probe(Color::White, Piece::Knight, mv.to()), 62);
        // Tiny subtrees still count.
        history.update(Color::Black, mv, 0);
        assert_eq!(history.probe(Color::Black, Piece::Knight, mv.to()), 2);
    }

    #[test]
    fn key_stays_in_its_bits() {
        let history = HistoryTable::new();
        let mv = quiet("e2", "e4", Piece::Pawn);
        history.update(Color::White, mv, u64::MAX);
        history.update(Color::White, mv, u64::MAX);
        let key = history.probe(Color::White, Piece::Pawn, mv.to());
        assert!(key < 1 << 22);
        assert_eq!(key & 1, 0);
    }

    #[test]
    fn decay_halves_and_clear_zeroes() {
        let history = HistoryTable::new();
        let mv = quiet("d1", "h5", Piece::Queen);
        history.update(Color::White, mv, 4 * 160 - 4);
        // counter 159
        history.decay();
        // counter 79: key ((79 >> 3) | 1) << 1 = 18
        assert_eq!(history.probe(Color::White, Piece::Queen, mv.to()), 18);
        history.clear();
        assert_eq!(history.probe(Color::White, Piece::Queen, mv.to()), 2);
    }

    #[test]
    fn batch_scoring_matches_probe() {
        let history = HistoryTable::new();
        let a = quiet("b1", "c3", Piece::Knight);
        let b = quiet("g1", "f3", Piece::Knight);
        history.update(Color::White, a, 4096);
        let mut moves = [ScoredMove { mv: a, key: 1 }, ScoredMove { mv: b, key: 0 }];
        history.score_moves(Color::White, &mut moves);
        assert_eq!(moves[0].key, history.probe(Color::White, Piece::Knight, a.to()) | 1);
        assert_eq!(moves[1].key, 2);
    }
}
