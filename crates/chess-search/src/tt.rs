//! Lockless shared transposition table.
//!
//! Every slot is a bucket of four entries; an entry is two 64-bit words,
//! the packed data and the position key XORed with that data. Readers load
//! both words and accept the entry only when `check ^ data` gives back their
//! key, so a read that races a write sees a key mismatch and is treated as a
//! miss. No locks are taken.
//!
//! Packed data:
//!
//! | bits   | field                                 |
//! |--------|---------------------------------------|
//! | 0..5   | remaining depth                       |
//! | 5..26  | move                                  |
//! | 26..28 | bound (1 exact, 2 lower, 3 upper)     |
//! | 28..45 | value + INF                           |
//! | 45..54 | search generation                     |

use crate::{INF, MATE_BOUND};
use chess_core::Move;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

const MOVE_SHIFT: u32 = 5;
const BOUND_SHIFT: u32 = 26;
const VALUE_SHIFT: u32 = 28;
const GENERATION_SHIFT: u32 = 45;

const DEPTH_MASK: u64 = (1 << 5) - 1;
const MOVE_MASK: u64 = (1 << Move::BITS) - 1;
const VALUE_MASK: u64 = (1 << 17) - 1;
const GENERATION_MASK: u64 = (1 << 9) - 1;

/// Deepest remaining depth an entry can record.
pub const MAX_DEPTH: i32 = DEPTH_MASK as i32;
/// Generations wrap after this many searches.
pub const GENERATIONS: u32 = 512;

const BUCKET: usize = 4;
const WORDS_PER_SLOT: usize = BUCKET * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exact = 1,
    Lower = 2,
    Upper = 3,
}

impl Bound {
    fn from_bits(bits: u64) -> Option<Bound> {
        match bits {
            1 => Some(Bound::Exact),
            2 => Some(Bound::Lower),
            3 => Some(Bound::Upper),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    depth: i32,
    mv: Move,
    bound: Bound,
    value: i32,
    generation: u32,
}

impl Entry {
    fn pack(&self) -> u64 {
        self.depth.clamp(0, MAX_DEPTH) as u64
            | (self.mv.raw() as u64 & MOVE_MASK) << MOVE_SHIFT
            | (self.bound as u64) << BOUND_SHIFT
            | ((self.value + INF) as u64 & VALUE_MASK) << VALUE_SHIFT
            | (self.generation as u64 & GENERATION_MASK) << GENERATION_SHIFT
    }

    fn unpack(data: u64) -> Option<Entry> {
        let bound = Bound::from_bits((data >> BOUND_SHIFT) & 3)?;
        Some(Entry {
            depth: (data & DEPTH_MASK) as i32,
            mv: Move::from_raw(((data >> MOVE_SHIFT) & MOVE_MASK) as u32),
            bound,
            value: ((data >> VALUE_SHIFT) & VALUE_MASK) as i32 - INF,
            generation: ((data >> GENERATION_SHIFT) & GENERATION_MASK) as u32,
        })
    }
}

/// Mate scores are stored as distance from the node, not from the root.
#[inline]
fn value_to_tt(value: i32, ply: usize) -> i32 {
    if value >= MATE_BOUND {
        value + ply as i32
    } else if value <= -MATE_BOUND {
        value - ply as i32
    } else {
        value
    }
}

#[inline]
fn value_from_tt(value: i32, ply: usize) -> i32 {
    if value >= MATE_BOUND {
        value - ply as i32
    } else if value <= -MATE_BOUND {
        value + ply as i32
    } else {
        value
    }
}

/// What a probe found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Stored best move, for ordering. [`Move::NONE`] on a miss.
    pub mv: Move,
    /// A score the caller may return without searching.
    pub cutoff: Option<i32>,
    /// A shallower search already failed low; a null move would too.
    pub avoid_null: bool,
}

impl Probe {
    pub const MISS: Probe = Probe {
        mv: Move::NONE,
        cutoff: None,
        avoid_null: false,
    };
}

pub struct TranspositionTable {
    words: Box<[AtomicU64]>,
    mask: usize,
    generation: AtomicU32,
}

impl TranspositionTable {
    /// A table of at most `mb` MiB. The slot count is rounded down to a power of two.
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) << 20;
        let wanted = (bytes / (WORDS_PER_SLOT * 8)).max(1);
        let slots = 1usize << (usize::BITS - 1 - wanted.leading_zeros());
        let words = (0..slots * WORDS_PER_SLOT)
            .map(|_| AtomicU64::new(0))
            .collect();
        TranspositionTable {
            words,
            mask: slots - 1,
            generation: AtomicU32::new(0),
        }
    }

    pub fn slots(&self) -> usize {
        self.mask + 1
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Ages every entry by one search.
    pub fn new_search(&self) {
        let next = (self.generation() + 1) % GENERATIONS;
        self.generation.store(next, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for word in self.words.iter() {
            word.store(0, Ordering::Relaxed);
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    #[inline]
    fn base(&self, key: u64, way: usize) -> usize {
        ((key as usize & self.mask) * BUCKET + way) * 2
    }

    #[inline]
    fn read(&self, base: usize) -> (u64, u64) {
        let data = self.words[base + 1].load(Ordering::Relaxed);
        let check = self.words[base].load(Ordering::Relaxed);
        (check, data)
    }

    #[inline]
    fn write(&self, base: usize, key: u64, data: u64) {
        self.words[base].store(key ^ data, Ordering::Relaxed);
        self.words[base + 1].store(data, Ordering::Relaxed);
    }

    fn find(&self, key: u64) -> Option<(usize, Entry)> {
        (0..BUCKET).find_map(|way| {
            let base = self.base(key, way);
            let (check, data) = self.read(base);
            if data != 0 && check ^ data == key {
                Entry::unpack(data).map(|entry| (base, entry))
            } else {
                None
            }
        })
    }

    /// Looks up `key` for a node searched to `depth` with window (`alpha`, `beta`).
    ///
    /// `null_depth` is the depth a null-move search from this node would use;
    /// an upper bound at least that deep below `beta` means the null move
    /// would fail and is not worth trying.
    pub fn probe(
        &self,
        key: u64,
        depth: i32,
        null_depth: i32,
        alpha: i32,
        beta: i32,
        ply: usize,
    ) -> Probe {
        let Some((base, entry)) = self.find(key) else {
            return Probe::MISS;
        };

        let generation = self.generation();
        if entry.generation != generation {
            self.write(base, key, Entry { generation, ..entry }.pack());
        }

        let value = value_from_tt(entry.value, ply);
        let mut probe = Probe {
            mv: entry.mv,
            cutoff: None,
            avoid_null: false,
        };
        if entry.depth >= depth {
            probe.cutoff = match entry.bound {
                Bound::Lower if value >= beta => Some(value),
                Bound::Upper if value <= alpha => Some(value),
                Bound::Exact if alpha < value && value < beta => Some(value),
                _ => None,
            };
        }
        if probe.cutoff.is_none()
            && entry.depth >= null_depth
            && entry.bound == Bound::Upper
            && value < beta
        {
            probe.avoid_null = true;
        }
        probe
    }

    /// The stored move for `key`, without touching the entry.
    pub fn probe_move(&self, key: u64) -> Move {
        self.find(key).map_or(Move::NONE, |(_, entry)| entry.mv)
    }

    pub fn store(&self, key: u64, mv: Move, depth: i32, bound: Bound, value: i32, ply: usize) {
        let generation = self.generation();
        let mut target = self.base(key, 0);
        let mut target_rank = i32::MAX;
        let mut mv = mv;

        for way in 0..BUCKET {
            let base = self.base(key, way);
            let (check, data) = self.read(base);
            if data != 0 && check ^ data == key {
                if mv.is_none() {
                    if let Some(old) = Entry::unpack(data) {
                        mv = old.mv;
                    }
                }
                target = base;
                break;
            }
            // Entries from earlier searches go first, then the shallowest.
            let (old_depth, old_generation) = match Entry::unpack(data) {
                Some(old) => (old.depth, old.generation),
                None => (-1, GENERATIONS),
            };
            let stale = if old_generation == generation { MAX_DEPTH + 2 } else { 0 };
            if old_depth + stale < target_rank {
                target_rank = old_depth + stale;
                target = base;
            }
        }

        let entry = Entry {
            depth,
            mv,
            bound,
            value: value_to_tt(value, ply),
            generation,
        };
        self.write(target, key, entry.pack());
    }

    /// Permille of sampled entries written during the current search.
    pub fn hashfull(&self) -> u32 {
        let sample = (self.words.len() / 2).min(1000);
        let generation = self.generation();
        let used = (0..sample)
            .filter(|&i| {
                let data = self.words[i * 2 + 1].load(Ordering::Relaxed);
                Entry::unpack(data).is_some_and(|e| e.generation == generation)
            })
            .count();
        (used * 1000 / sample.max(1)) as u32
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("slots", &self.slots())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MATE;
    use chess_core::{Piece, Square};
    use proptest::prelude::*;

    fn some_move() -> Move {
        Move::new(
            Square::from_algebraic("g1").unwrap(),
            Square::from_algebraic("f3").unwrap(),
            Piece::Knight,
            None,
            None,
        )
    }

    fn table() -> TranspositionTable {
        let tt = TranspositionTable::new(1);
        tt.new_search();
        tt
    }

    #[test]
    fn size_is_a_power_of_two() {
        let tt = TranspositionTable::new(1);
        assert_eq!(tt.slots(), 16_384);
        assert_eq!(TranspositionTable::new(3).slots(), 32_768);
    }

    #[test]
    fn exact_entry_round_trips() {
        let tt = table();
        let key = 0xDEAD_BEEF_1234_5678;
        tt.store(key, some_move(), 6, Bound::Exact, 42, 0);
        let probe = tt.probe(key, 6, 6, -INF, INF, 0);
        assert_eq!(probe.mv, some_move());
        assert_eq!(probe.cutoff, Some(42));
        assert_eq!(tt.probe_move(key), some_move());

        // Not deep enough: ordering only.
        let probe = tt.probe(key, 7, 7, -INF, INF, 0);
        assert_eq!(probe.cutoff, None);
        assert_eq!(probe.mv, some_move());

        assert_eq!(tt.probe(key ^ 1, 1, 1, -INF, INF, 0), Probe::MISS);
    }

    #[test]
    fn bounds_cut_only_on_their_side() {
        let tt = table();
        tt.store(1, Move::NONE, 5, Bound::Lower, 100, 0);
        assert_eq!(tt.probe(1, 5, 3, 0, 50, 0).cutoff, Some(100));
        assert_eq!(tt.probe(1, 5, 3, 0, 150, 0).cutoff, None);

        tt.store(2, Move::NONE, 5, Bound::Upper, -100, 0);
        assert_eq!(tt.probe(2, 5, 3, -50, 0, 0).cutoff, Some(-100));
        assert_eq!(tt.probe(2, 5, 3, -150, 0, 0).cutoff, None);

        tt.store(3, Move::NONE, 5, Bound::Exact, 10, 0);
        assert_eq!(tt.probe(3, 5, 3, 20, 30, 0).cutoff, None);
    }

    #[test]
    fn shallow_fail_low_avoids_null_move() {
        let tt = table();
        tt.store(9, Move::NONE, 2, Bound::Upper, -50, 0);
        let probe = tt.probe(9, 5, 2, -100, 0, 0);
        assert_eq!(probe.cutoff, None);
        assert!(probe.avoid_null);
        assert!(!tt.probe(9, 5, 3, -100, 0, 0).avoid_null);
    }

    #[test]
    fn mate_scores_are_ply_relative() {
        let tt = table();
        tt.store(7, Move::NONE, 4, Bound::Exact, MATE - 5, 3);
        assert_eq!(tt.probe(7, 4, 4, -INF, INF, 7).cutoff, Some(MATE - 9));
        tt.store(8, Move::NONE, 4, Bound::Exact, -MATE + 6, 2);
        assert_eq!(tt.probe(8, 4, 4, -INF, INF, 0).cutoff, Some(-MATE + 4));
    }

    #[test]
    fn same_key_keeps_its_move() {
        let tt = table();
        tt.store(11, some_move(), 3, Bound::Lower, 10, 0);
        tt.store(11, Move::NONE, 5, Bound::Upper, 0, 0);
        assert_eq!(tt.probe_move(11), some_move());
        assert_eq!(tt.probe(11, 5, 5, 10, 20, 0).cutoff, Some(0));
    }

    #[test]
    fn replacement_prefers_old_then_shallow() {
        let tt = table();
        let slots = tt.slots() as u64;
        let key = |i: u64| 5 + i * slots;
        for (i, depth) in [5, 3, 7, 9].into_iter().enumerate() {
            tt.store(key(i as u64), Move::NONE, depth, Bound::Exact, 0, 0);
        }
        for i in 0..4 {
            assert_eq!(tt.probe(key(i), 1, 1, -INF, INF, 0).cutoff, Some(0));
        }

        tt.new_search();
        // Depth 3 from the last search goes first, even though the new entry is shallower.
        tt.store(key(4), Move::NONE, 1, Bound::Exact, 0, 0);
        assert_eq!(tt.probe(key(1), 1, 1, -INF, INF, 0), Probe::MISS);

        // Probing refreshes the generation, so key(0) survives and key(2) is replaced.
        tt.probe(key(0), 1, 1, -INF, INF, 0);
        tt.store(key(5), Move::NONE, 2, Bound::Exact, 0, 0);
        assert_ne!(tt.probe(key(0), 1, 1, -INF, INF, 0), Probe::MISS);
        assert_eq!(tt.probe(key(2), 1, 1, -INF, INF, 0), Probe::MISS);

        // All current: the shallowest goes.
        tt.probe(key(3), 1, 1, -INF, INF, 0);
        tt.store(key(6), Move::NONE, 8, Bound::Exact, 0, 0);
        assert_eq!(tt.probe(key(4), 1, 1, -INF, INF, 0), Probe::MISS);
        assert_ne!(tt.probe(key(3), 1, 1, -INF, INF, 0), Probe::MISS);
    }

    #[test]
    fn torn_entry_is_a_miss() {
        let tt = table();
        let key = 0x1234;
        tt.store(key, some_move(), 4, Bound::Exact, 7, 0);
        let base = tt.base(key, 0);
        tt.words[base + 1].fetch_xor(1 << VALUE_SHIFT, Ordering::Relaxed);
        assert_eq!(tt.probe(key, 1, 1, -INF, INF, 0), Probe::MISS);
    }

    #[test]
    fn generation_wraps_and_clear_resets() {
        let tt = TranspositionTable::new(1);
        for _ in 0..GENERATIONS {
            tt.new_search();
        }
        assert_eq!(tt.generation(), 0);

        tt.new_search();
        assert_eq!(tt.hashfull(), 0);
        for i in 0..4000u64 {
            tt.store(i, Move::NONE, 1, Bound::Lower, 0, 0);
        }
        assert!(tt.hashfull() > 0);
        tt.clear();
        assert_eq!(tt.hashfull(), 0);
        assert_eq!(tt.probe_move(3), Move::NONE);
    }

    proptest! {
        #[test]
        fn probe_after_store_is_coherent(
            key in any::<u64>(),
            depth in 1i32..=MAX_DEPTH,
            value in -(MATE_BOUND - 1)..MATE_BOUND,
            bound in 1u64..=3,
        ) {
            let tt = table();
            let bound = Bound::from_bits(bound).unwrap();
            tt.store(key, some_move(), depth, bound, value, 0);
            let probe = tt.probe(key, depth, depth, -INF, INF, 0);
            prop_assert_eq!(probe.mv, some_move());
            if let Some(v) = probe.cutoff {
                prop_assert_eq!(v, value);
            }
        }
    }
}
