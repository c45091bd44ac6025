//! Per-ply search state.

use crate::MAX_PLY;
use chess_core::Move;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Position key on entry, for repetition detection.
    pub key: u64,
    /// Static evaluation of the node.
    pub eval: i32,
    /// Quiet moves that refuted a sibling, newest first.
    pub killers: [Move; 2],
    /// Best move from the previous iteration or from IID, tried first when
    /// the hash table has nothing.
    pub singular: Move,
    pub in_check: bool,
    pub can_null: bool,
    /// Reached by a null move; repetition look-back stops here.
    pub after_null: bool,
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            key: 0,
            eval: 0,
            killers: [Move::NONE; 2],
            singular: Move::NONE,
            in_check: false,
            can_null: true,
            after_null: false,
        }
    }
}

/// One frame per ply, plus one so a node can always prepare its child.
#[derive(Debug, Clone)]
pub struct Stack {
    frames: Vec<Frame>,
}

impl Stack {
    pub fn new() -> Self {
        Stack {
            frames: vec![Frame::default(); MAX_PLY + 1],
        }
    }

    pub fn clear(&mut self) {
        self.frames.fill(Frame::default());
    }

    #[inline]
    pub fn frame(&self, ply: usize) -> &Frame {
        &self.frames[ply]
    }

    #[inline]
    pub fn frame_mut(&mut self, ply: usize) -> &mut Frame {
        &mut self.frames[ply]
    }

    #[inline]
    pub fn killers(&self, ply: usize) -> [Move; 2] {
        self.frames[ply].killers
    }

    /// Records a refutation, pushing the older killer down.
    pub fn store_killer(&mut self, ply: usize, mv: Move) {
        let killers = &mut self.frames[ply].killers;
        if killers[0] != mv {
            killers[1] = killers[0];
            killers[0] = mv;
        }
    }

    /// Frames `0..=ply`, for a worker joining a split point.
    pub fn prefix(&self, ply: usize) -> Vec<Frame> {
        self.frames[..=ply].to_vec()
    }

    pub fn load_prefix(&mut self, prefix: &[Frame]) {
        self.frames[..prefix.len()].copy_from_slice(prefix);
    }

    /// How often the position at `ply` occurred before, looking back every
    /// second ply while the halfmove clock allows, first through the stack
    /// and then through the game before the root. Positions before the
    /// latest null move are never compared.
    pub fn repetitions(&self, ply: usize, halfmove: u32, game: &[u64]) -> usize {
        let key = self.frames[ply].key;
        let reach = (1..=ply)
            .rev()
            .find(|&i| self.frames[i].after_null)
            .map_or(halfmove as usize, |i| (ply - i).min(halfmove as usize));
        let mut count = 0;
        let mut back = 2;
        while back <= reach {
            let seen = if back <= ply {
                self.frames[ply - back].key
            } else {
                match game.len().checked_sub(back - ply) {
                    Some(i) => game[i],
                    None => break,
                }
            };
            if seen == key {
                count += 1;
            }
            back += 2;
        }
        count
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}
