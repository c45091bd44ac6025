//! Search threads.
//!
//! Each worker is a long-lived thread that parks on the balancer between
//! jobs. A job is either the root of a search or a split point opened by
//! another worker. Workers own their stack and pawn cache; everything they
//! share lives in [`Shared`].

use crate::balancer::{Assignment, Balancer};
use crate::history::HistoryTable;
use crate::pawns::PawnCache;
use crate::selector::MoveSelector;
use crate::split::{NodeParams, SplitPoint};
use crate::stack::Stack;
use crate::tt::TranspositionTable;
use chess_core::Move;
use chess_engine::Board;
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// How long a master waits on its split point before looking for work again.
const HELP_POLL: Duration = Duration::from_millis(1);

/// State shared by the engine and all of its workers.
pub(crate) struct Shared {
    pub tt: TranspositionTable,
    pub history: HistoryTable,
    pub balancer: Balancer,
    pub threads: usize,
    pub abort: Arc<AtomicBool>,
    /// Cleared while the first iteration runs so a move is always found.
    pub abortable: AtomicBool,
    /// Bumped when pawn caches must be emptied.
    pub pawn_epoch: AtomicU64,
    pub next_sp: AtomicU64,
    /// Nodes spent re-searching after a failed zero-window search.
    pub researched: AtomicU64,
}

/// The running result of a node's move loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Progress {
    pub alpha: i32,
    pub best: i32,
    pub best_move: Move,
    pub legal: usize,
}

pub(crate) struct Worker {
    pub index: usize,
    pub shared: Arc<Shared>,
    assignments: Receiver<Assignment>,
    pub stack: Stack,
    pub pawns: PawnCache,
    pawn_epoch: u64,
    /// Innermost split point this worker is searching under.
    pub current_sp: Option<Arc<SplitPoint>>,
    pub nodes: u64,
    pub game: Arc<[u64]>,
    /// Best root move of the iteration in progress.
    pub root_best: Move,
}

impl Worker {
    pub(crate) fn new(index: usize, shared: Arc<Shared>, assignments: Receiver<Assignment>) -> Self {
        Worker {
            index,
            shared,
            assignments,
            stack: Stack::new(),
            pawns: PawnCache::new(),
            pawn_epoch: 0,
            current_sp: None,
            nodes: 0,
            game: Arc::from(Vec::new()),
            root_best: Move::NONE,
        }
    }

    pub(crate) fn run(mut self) {
        debug!(worker = self.index, "search worker started");
        loop {
            self.shared.balancer.park(self.index);
            match self.assignments.recv() {
                Ok(Assignment::Root(job)) => {
                    self.refresh_pawn_cache();
                    self.run_root(job);
                }
                Ok(Assignment::Split(sp)) => {
                    self.refresh_pawn_cache();
                    self.serve(sp);
                }
                Ok(Assignment::Quit) | Err(_) => break,
            }
        }
        debug!(worker = self.index, "search worker stopped");
    }

    fn refresh_pawn_cache(&mut self) {
        let epoch = self.shared.pawn_epoch.load(Ordering::Acquire);
        if epoch != self.pawn_epoch {
            self.pawns.clear();
            self.pawn_epoch = epoch;
        }
    }

    /// The current node's result no longer matters: the search was aborted
    /// or a split point above this worker was refuted.
    #[inline]
    pub(crate) fn stopped(&self) -> bool {
        (self.shared.abort.load(Ordering::Relaxed) && self.shared.abortable.load(Ordering::Relaxed))
            || self.current_sp.as_ref().is_some_and(|sp| sp.chain_cancelled())
    }

    /// Opens a split point for the rest of a node's moves, searches it with
    /// whoever joins, and returns the combined result once every servant
    /// has left.
    pub(crate) fn split(
        &mut self,
        board: &mut Board,
        selector: MoveSelector,
        params: NodeParams,
        progress: Progress,
    ) -> Progress {
        let id = self.shared.next_sp.fetch_add(1, Ordering::Relaxed);
        let sp = Arc::new(SplitPoint::new(
            id,
            self.index,
            self.current_sp.clone(),
            board.clone(),
            self.stack.prefix(params.ply),
            Arc::clone(&self.game),
            params,
            selector,
            progress.alpha,
            progress.best,
            progress.best_move,
            progress.legal,
        ));
        trace!(worker = self.index, sp = id, ply = params.ply, depth = params.depth, "split");

        let parent = self.current_sp.replace(Arc::clone(&sp));
        self.shared.balancer.add(&sp);
        self.split_loop(&sp, board);
        self.shared.balancer.remove(&sp);
        sp.leave(self.index, 0);
        self.wait_for_servants(&sp);
        self.current_sp = parent;

        let state = sp.state.lock();
        self.nodes += state.nodes;
        Progress {
            alpha: state.alpha,
            best: state.best,
            best_move: state.best_move,
            legal: state.legal,
        }
    }

    /// Joins `sp` as a servant and searches moves from it until none are left.
    pub(crate) fn serve(&mut self, sp: Arc<SplitPoint>) {
        let mut board = sp.board.clone();
        self.stack.load_prefix(&sp.prefix);
        let game = std::mem::replace(&mut self.game, Arc::clone(&sp.game));
        let previous = self.current_sp.replace(Arc::clone(&sp));
        let outer_nodes = std::mem::take(&mut self.nodes);

        self.split_loop(&sp, &mut board);

        let spent = std::mem::replace(&mut self.nodes, outer_nodes);
        self.current_sp = previous;
        self.game = game;
        sp.leave(self.index, spent);
    }

    /// Searches moves drawn from `sp` on the worker's own copy of its board.
    fn split_loop(&mut self, sp: &Arc<SplitPoint>, board: &mut Board) {
        let params = sp.params;
        loop {
            if self.stopped() {
                break;
            }
            let (mv, index, alpha) = {
                let mut state = sp.state.lock();
                if state.cutoff {
                    break;
                }
                match state.selector.next(&sp.board, &self.shared.history) {
                    Some(mv) => {
                        let index = state.legal;
                        state.legal += 1;
                        (mv, index, state.alpha)
                    }
                    None => {
                        state.exhausted = true;
                        break;
                    }
                }
            };

            let before = self.nodes;
            let score = self.search_move(board, mv, &params, alpha, index);
            if self.stopped() {
                break;
            }

            let mut state = sp.state.lock();
            if score > state.best {
                state.best = score;
                if score > state.alpha {
                    state.alpha = score;
                    state.best_move = mv;
                    if score >= params.beta {
                        state.cutoff = true;
                        drop(state);
                        sp.cancel();
                        self.refutation(&sp.board, mv, params.ply, self.nodes - before);
                        break;
                    }
                }
            }
        }
    }

    /// Helps below `sp` until its last servant has left.
    fn wait_for_servants(&mut self, sp: &Arc<SplitPoint>) {
        loop {
            if sp.state.lock().active == 0 {
                return;
            }
            if let Some(other) = self.shared.balancer.find_helpable(self.index, sp) {
                trace!(worker = self.index, sp = other.id, "helping");
                let saved = self.stack.clone();
                self.serve(other);
                self.stack = saved;
                continue;
            }
            let mut state = sp.state.lock();
            if state.active == 0 {
                return;
            }
            sp.drained.wait_for(&mut state, HELP_POLL);
        }
    }

    /// Credits a quiet move that refuted a node.
    pub(crate) fn refutation(&mut self, board: &Board, mv: Move, ply: usize, nodes: u64) {
        if mv.is_quiet() {
            self.shared.history.update(board.side_to_move(), mv, nodes);
            self.stack.store_killer(ply, mv);
        }
    }
}
