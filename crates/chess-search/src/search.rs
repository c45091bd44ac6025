//! Principal variation search with quiescence.
//!
//! `ybw` is a fail-soft alpha-beta search. Each node searches its first
//! move alone; once that has narrowed the window the node may become a
//! split point and share its remaining moves with idle workers.

use crate::engine::{Report, RootJob, SearchInfo, SearchOutcome};
use crate::eval::{evaluate, LAZY_MARGIN};
use crate::selector::{MoveSelector, Stage};
use crate::split::{NodeParams, NodeType};
use crate::tt::{Bound, TranspositionTable};
use crate::worker::{Progress, Worker};
use crate::{is_mate_score, DRAW, INF, MATE, MAX_PLY};
use chess_core::{Move, Piece};
use chess_engine::exchange::pinned_pieces;
use chess_engine::movegen::is_legal;
use chess_engine::{legal_moves, see, tables, Board};
use std::sync::atomic::Ordering;
use tracing::{debug, info};

/// Nodes at least this deep may become split points.
pub(crate) const SPLIT_MIN: i32 = 2;
/// Quiescence adds quiet checks down to this depth.
pub(crate) const MIN_CHECK_DEPTH: i32 = -1;
/// At most this many quiet checks are added along one quiescence line.
const MAX_CHECK_PLIES: u32 = 2;
const FUTILITY_MARGIN: i32 = LAZY_MARGIN;
const DELTA_MARGIN: i32 = Piece::Rook.value();

/// Null-move pruning may be tried at this node.
pub(crate) fn null_move_allowed(
    board: &Board,
    node: NodeType,
    can_null: bool,
    avoid_null: bool,
    eval: i32,
    beta: i32,
) -> bool {
    node != NodeType::Pv
        && can_null
        && !avoid_null
        && !board.in_check()
        && eval >= beta
        && !is_mate_score(beta)
        && board.has_non_pawn_material(board.side_to_move())
}

/// Depth of the reduced search behind a null move.
#[inline]
fn null_depth(depth: i32) -> i32 {
    if depth > 6 {
        depth - 3
    } else {
        depth - 2
    }
}

/// A pawn push with no enemy pawn left to stop it.
fn passed_pawn_push(board: &Board, mv: Move) -> bool {
    if mv.piece() != Piece::Pawn {
        return false;
    }
    let us = board.side_to_move();
    let enemy = board.pieces(us.opposite(), Piece::Pawn);
    (tables().passed(us, mv.from()) & enemy).is_empty()
}

impl Worker {
    /// Searches `board` to `depth` with window (`alpha`, `beta`).
    ///
    /// Returns a meaningless value when [`Worker::stopped`] turns true; every
    /// caller checks that before using the score.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn ybw(
        &mut self,
        board: &mut Board,
        mut alpha: i32,
        beta: i32,
        mut depth: i32,
        ply: usize,
        mut ext_left: i32,
        node: NodeType,
    ) -> i32 {
        if depth <= 0 {
            return self.quiescence(board, alpha, beta, 0, ply, 0);
        }
        if self.stopped() {
            return 0;
        }

        let in_check = board.in_check();
        let key = board.key();
        {
            let frame = self.stack.frame_mut(ply);
            frame.key = key;
            frame.in_check = in_check;
        }
        if ply > 0 && self.stack.repetitions(ply, board.halfmove_clock(), &self.game) >= 2 {
            return DRAW;
        }
        if ply >= MAX_PLY - 1 {
            return evaluate(board, &mut self.pawns, alpha, beta);
        }
        if in_check && ext_left > 0 {
            depth += 1;
            ext_left -= 1;
        }
        if board.halfmove_clock() >= 100 {
            return if in_check && board.has_no_legal_moves() {
                ply as i32 - MATE
            } else {
                DRAW
            };
        }

        let pv = node == NodeType::Pv;
        let probe = self
            .shared
            .tt
            .probe(key, depth, null_depth(depth), alpha, beta, ply);
        if !pv {
            if let Some(value) = probe.cutoff {
                return value;
            }
        }

        let eval = if in_check {
            -INF
        } else {
            evaluate(board, &mut self.pawns, alpha, beta)
        };
        self.stack.frame_mut(ply).eval = eval;

        let can_null = self.stack.frame(ply).can_null;
        if null_move_allowed(board, node, can_null, probe.avoid_null, eval, beta) {
            let memento = board.make_null();
            self.nodes += 1;
            {
                let child = self.stack.frame_mut(ply + 1);
                child.can_null = false;
                child.after_null = true;
            }
            let score = -self.ybw(
                board,
                -beta,
                -beta + 1,
                null_depth(depth),
                ply + 1,
                ext_left,
                NodeType::Cut,
            );
            {
                let child = self.stack.frame_mut(ply + 1);
                child.can_null = true;
                child.after_null = false;
            }
            board.unmake_null(memento);
            if self.stopped() {
                return 0;
            }
            if score >= beta {
                self.shared.tt.store(key, Move::NONE, depth, Bound::Lower, beta, ply);
                return beta;
            }
        }

        let mut first = probe.mv;
        if pv && depth >= 4 && first.is_none() {
            self.ybw(board, alpha, beta, depth - 2, ply, ext_left, NodeType::Pv);
            if self.stopped() {
                return 0;
            }
            first = self.shared.tt.probe_move(key);
        }
        if first.is_none() && ply == 0 {
            first = self.stack.frame(0).singular;
        }

        let params = NodeParams {
            beta,
            depth,
            ply,
            ext_left,
            node,
            futile: !pv
                && depth <= 3
                && !in_check
                && eval + FUTILITY_MARGIN < alpha
                && !is_mate_score(alpha)
                && !is_mate_score(beta),
            lmr: depth >= 2 && !pv,
            eval,
            in_check,
        };

        let old_alpha = alpha;
        let mut progress = Progress {
            alpha,
            best: -INF,
            best_move: Move::NONE,
            legal: 0,
        };
        let mut selector = MoveSelector::full(board, first, self.stack.killers(ply));
        while let Some(mv) = selector.next(board, &self.shared.history) {
            let index = progress.legal;
            progress.legal += 1;
            let before = self.nodes;
            let score = self.search_move(board, mv, &params, alpha, index);
            if self.stopped() {
                return 0;
            }

            if score > progress.best {
                progress.best = score;
                if score > alpha {
                    alpha = score;
                    progress.alpha = score;
                    progress.best_move = mv;
                    if ply == 0 {
                        self.root_best = mv;
                    }
                    if score >= beta {
                        self.refutation(board, mv, ply, self.nodes - before);
                        self.shared.tt.store(key, mv, depth, Bound::Lower, score, ply);
                        return score;
                    }
                }
            }

            if self.may_split(&params, progress.legal, selector.stage()) {
                progress = self.split(board, selector, params, progress);
                if self.stopped() {
                    return 0;
                }
                alpha = progress.alpha;
                break;
            }
        }

        if progress.legal == 0 {
            return if in_check { ply as i32 - MATE } else { DRAW };
        }
        let bound = if progress.best >= beta {
            Bound::Lower
        } else if alpha > old_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.shared
            .tt
            .store(key, progress.best_move, depth, bound, progress.best, ply);
        progress.best
    }

    /// Splitting gate: enough of the node is searched that the rest is
    /// worth sharing, and somebody is idle to share it with.
    fn may_split(&self, params: &NodeParams, legal: usize, stage: Stage) -> bool {
        if self.shared.threads < 2 || params.depth < SPLIT_MIN || stage == Stage::Done {
            return false;
        }
        let ready = match params.node {
            NodeType::Pv => legal > 0 && params.ply > 0,
            NodeType::Cut => legal > 3 && stage == Stage::Remaining,
            NodeType::All => legal > 0,
        };
        ready && self.shared.balancer.has_idle()
    }

    /// Searches one move of a node: pruning, reductions, extensions and the
    /// zero-window scout with its re-searches. `index` is the move's position
    /// among the node's legal moves.
    pub(crate) fn search_move(
        &mut self,
        board: &mut Board,
        mv: Move,
        params: &NodeParams,
        alpha: i32,
        index: usize,
    ) -> i32 {
        let winning_promotion = mv.promoted() == Some(Piece::Queen)
            && see(board, mv.from(), mv.to(), mv.captured()) >= 0;
        let passed_push = passed_pawn_push(board, mv);

        let memento = board.make(mv);
        self.nodes += 1;
        let gives_check = board.in_check();

        if params.futile && mv.is_quiet() && !gives_check && mv.piece() != Piece::Pawn {
            board.unmake(mv, memento);
            return params.eval + FUTILITY_MARGIN;
        }

        let mut depth = params.depth - 1;
        let mut ext_left = params.ext_left;
        if winning_promotion && ext_left > 0 {
            depth += 1;
            ext_left -= 1;
        }
        let ply = params.ply + 1;
        let beta = params.beta;
        let child = params.node.child(index);

        let score = if index == 0 {
            -self.ybw(board, -beta, -alpha, depth, ply, ext_left, child)
        } else {
            let late = if params.node == NodeType::All { 2 } else { 6 };
            let reduce = params.lmr
                && index >= late
                && mv.is_quiet()
                && !gives_check
                && !passed_push;
            let scout_depth = if reduce { depth - 1 } else { depth };
            let mut score = -self.ybw(board, -alpha - 1, -alpha, scout_depth, ply, ext_left, child);

            let before = self.nodes;
            if reduce && score > alpha && !self.stopped() {
                score = -self.ybw(board, -alpha - 1, -alpha, depth, ply, ext_left, child);
            }
            if score > alpha && score < beta && !self.stopped() {
                let child = if params.node == NodeType::Pv {
                    NodeType::Pv
                } else {
                    child
                };
                score = -self.ybw(board, -beta, -alpha, depth, ply, ext_left, child);
            }
            let researched = self.nodes - before;
            if researched > 0 {
                self.shared.researched.fetch_add(researched, Ordering::Relaxed);
            }
            score
        };

        board.unmake(mv, memento);
        score
    }

    /// Captures, promotions and (near the horizon) quiet checks until the
    /// position is quiet.
    pub(crate) fn quiescence(
        &mut self,
        board: &mut Board,
        mut alpha: i32,
        beta: i32,
        depth: i32,
        ply: usize,
        checks_added: u32,
    ) -> i32 {
        if self.stopped() {
            return 0;
        }
        if ply >= MAX_PLY - 1 {
            return evaluate(board, &mut self.pawns, alpha, beta);
        }

        let in_check = board.in_check();
        let mut best = -INF;
        let mut eval = -INF;
        if !in_check {
            eval = evaluate(board, &mut self.pawns, alpha, beta);
            if eval >= beta {
                return eval;
            }
            alpha = alpha.max(eval);
            best = eval;
        }

        let with_checks = depth >= MIN_CHECK_DEPTH && checks_added < MAX_CHECK_PLIES;
        let mut selector = MoveSelector::quiescence(board, with_checks);
        let mut legal = 0;
        while let Some(mv) = selector.next(board, &self.shared.history) {
            legal += 1;
            let memento = board.make(mv);
            self.nodes += 1;
            let gives_check = board.in_check();

            if !in_check && !gives_check && !mv.is_promotion() {
                let gain = mv.captured().map_or(0, Piece::value);
                if eval + gain + DELTA_MARGIN < alpha {
                    board.unmake(mv, memento);
                    continue;
                }
            }

            let added = checks_added + u32::from(gives_check && mv.is_quiet());
            let score = -self.quiescence(board, -beta, -alpha, depth - 1, ply + 1, added);
            board.unmake(mv, memento);
            if self.stopped() {
                return 0;
            }

            if score > best {
                best = score;
                if score > alpha {
                    alpha = score;
                    if score >= beta {
                        return score;
                    }
                }
            }
        }

        if in_check && legal == 0 {
            return ply as i32 - MATE;
        }
        best
    }

    /// Iterative deepening from the root of a search.
    pub(crate) fn run_root(&mut self, job: RootJob) {
        let RootJob {
            board,
            game,
            max_depth,
            started,
            reports,
        } = job;
        let mut board = board;
        self.game = game;
        self.stack.clear();
        self.current_sp = None;
        self.nodes = 0;
        self.shared.abortable.store(false, Ordering::Release);

        let fallback = legal_moves(&board).iter().next().unwrap_or(Move::NONE);
        let mut outcome = SearchOutcome {
            best_move: fallback,
            score: 0,
            depth: 0,
            nodes: 0,
            researched: 0,
        };

        for depth in 1..=max_depth {
            self.root_best = Move::NONE;
            self.stack.frame_mut(0).singular = outcome.best_move;
            let score = self.ybw(&mut board, -INF, INF, depth, 0, depth, NodeType::Pv);
            if self.stopped() {
                debug!(depth, "iteration abandoned");
                break;
            }
            if !self.root_best.is_none() {
                outcome.best_move = self.root_best;
            }
            outcome.score = score;
            outcome.depth = depth;
            outcome.nodes = self.nodes;

            let info = SearchInfo {
                depth,
                score,
                nodes: self.nodes,
                elapsed: started.elapsed(),
                pv: principal_variation(&self.shared.tt, &board, outcome.best_move, depth as usize),
                hashfull: self.shared.tt.hashfull(),
            };
            if reports.send(Report::Iteration(info)).is_err() {
                break;
            }
            self.shared.abortable.store(true, Ordering::Release);
            if self.shared.abort.load(Ordering::Relaxed) {
                break;
            }
        }

        outcome.nodes = self.nodes;
        outcome.researched = self.shared.researched.load(Ordering::Relaxed);
        info!(
            best = %outcome.best_move,
            score = outcome.score,
            depth = outcome.depth,
            nodes = outcome.nodes,
            "search finished"
        );
        let _ = reports.send(Report::Finished(outcome));
    }
}

/// The root move followed by hash moves, as long as each is legal and no
/// position repeats.
pub(crate) fn principal_variation(
    tt: &TranspositionTable,
    root: &Board,
    first: Move,
    limit: usize,
) -> Vec<Move> {
    if first.is_none() {
        return Vec::new();
    }
    let mut board = root.clone();
    let mut pv = vec![first];
    board.make(first);
    let mut seen = vec![root.key(), board.key()];
    while pv.len() < limit.max(1) {
        let mv = tt.probe_move(board.key());
        if mv.is_none()
            || !board.is_pseudo_legal(mv)
            || !is_legal(&board, mv, pinned_pieces(&board, board.side_to_move()))
        {
            break;
        }
        board.make(mv);
        if seen.contains(&board.key()) {
            break;
        }
        seen.push(board.key());
        pv.push(mv);
    }
    pv
}
