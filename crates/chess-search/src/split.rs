//! Split points.
//!
//! A split point is a node whose remaining moves are searched by several
//! workers at once. The master that created it keeps searching moves from
//! it; servants join, copy its board and the stack above it, and draw moves
//! from the shared selector until the moves run out or one of them refutes
//! the node. A refutation cancels the split point, and with it every split
//! point below it, since those check their whole parent chain.

use crate::selector::MoveSelector;
use crate::stack::Frame;
use chess_core::Move;
use chess_engine::Board;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How a node is expected to resolve, from the ordering so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeType {
    /// Expected to fail low: every move must be searched.
    All = 0,
    /// Expected to fail high on an early move.
    Cut = 1,
    /// On the principal variation.
    Pv = 2,
}

impl NodeType {
    /// Type of the child reached by the move at `index` (0-based).
    pub fn child(self, index: usize) -> NodeType {
        match (self, index) {
            (NodeType::Pv, 0) => NodeType::Pv,
            (NodeType::Cut, 0) => NodeType::All,
            _ => NodeType::Cut,
        }
    }
}

/// Everything about a node that stays fixed while its moves are searched.
#[derive(Debug, Clone, Copy)]
pub struct NodeParams {
    pub beta: i32,
    pub depth: i32,
    pub ply: usize,
    pub ext_left: i32,
    pub node: NodeType,
    /// Quiet non-checking piece moves may be skipped.
    pub futile: bool,
    /// Late quiet moves are searched one ply shallower.
    pub lmr: bool,
    pub eval: i32,
    pub in_check: bool,
}

/// The running result of a node, and the moves still to be searched.
pub struct SplitState {
    pub selector: MoveSelector,
    pub alpha: i32,
    pub best: i32,
    pub best_move: Move,
    /// Moves handed out so far, including those searched before the split.
    pub legal: usize,
    /// Nodes searched by servants that have left.
    pub nodes: u64,
    pub servants: u64,
    pub active: usize,
    pub exhausted: bool,
    pub cutoff: bool,
}

pub struct SplitPoint {
    pub id: u64,
    pub master: usize,
    pub parent: Option<Arc<SplitPoint>>,
    /// The position at the node. Never made moves on; workers clone it.
    pub board: Board,
    /// Stack frames `0..=ply` of the master.
    pub prefix: Vec<Frame>,
    /// Position keys of the game before the search root.
    pub game: Arc<[u64]>,
    pub params: NodeParams,
    cancelled: AtomicBool,
    pub state: Mutex<SplitState>,
    pub drained: Condvar,
}

impl SplitPoint {
    /// Creates a split point with its master already attached.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        master: usize,
        parent: Option<Arc<SplitPoint>>,
        board: Board,
        prefix: Vec<Frame>,
        game: Arc<[u64]>,
        params: NodeParams,
        selector: MoveSelector,
        alpha: i32,
        best: i32,
        best_move: Move,
        legal: usize,
    ) -> Self {
        SplitPoint {
            id,
            master,
            parent,
            board,
            prefix,
            game,
            params,
            cancelled: AtomicBool::new(false),
            state: Mutex::new(SplitState {
                selector,
                alpha,
                best,
                best_move,
                legal,
                nodes: 0,
                servants: 1 << master,
                active: 1,
                exhausted: false,
                cutoff: false,
            }),
            drained: Condvar::new(),
        }
    }

    /// Index key: deeper and more PV-like nodes first.
    pub fn priority(&self) -> u32 {
        ((self.params.depth.max(0) as u32) << 2) | self.params.node as u32
    }

    /// Registers worker `index` as a servant if there is still work here.
    pub fn try_attach(&self, index: usize) -> bool {
        if self.chain_cancelled() {
            return false;
        }
        let mut state = self.state.lock();
        if state.exhausted || state.cutoff || state.servants & (1 << index) != 0 {
            return false;
        }
        state.servants |= 1 << index;
        state.active += 1;
        true
    }

    /// Deregisters worker `index`, crediting the nodes it searched here.
    pub fn leave(&self, index: usize, nodes: u64) {
        let mut state = self.state.lock();
        state.servants &= !(1 << index);
        state.active = state.active.saturating_sub(1);
        state.nodes += nodes;
        if state.active == 0 {
            self.drained.notify_all();
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// This split point or one of its ancestors was cancelled.
    pub fn chain_cancelled(&self) -> bool {
        let mut sp = Some(self);
        while let Some(current) = sp {
            if current.cancelled.load(Ordering::Acquire) {
                return true;
            }
            sp = current.parent.as_deref();
        }
        false
    }

    /// `ancestor` is this split point or lies on its parent chain.
    pub fn descends_from(&self, ancestor: &SplitPoint) -> bool {
        let mut sp = Some(self);
        while let Some(current) = sp {
            if std::ptr::eq(current, ancestor) {
                return true;
            }
            sp = current.parent.as_deref();
        }
        false
    }
}

impl std::fmt::Debug for SplitPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitPoint")
            .field("id", &self.id)
            .field("master", &self.master)
            .field("ply", &self.params.ply)
            .field("depth", &self.params.depth)
            .field("node", &self.params.node)
            .finish()
    }
}
