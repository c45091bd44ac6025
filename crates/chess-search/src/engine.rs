//! The engine: worker threads, shared tables and the search entry point.

use crate::balancer::{Assignment, Balancer};
use crate::config::EngineConfig;
use crate::history::HistoryTable;
use crate::tt::TranspositionTable;
use crate::worker::{Shared, Worker};
use crate::{DRAW, MATE, MAX_PLY};
use chess_core::Move;
use chess_engine::movegen::init_magics;
use chess_engine::{legal_moves, tables, Board};
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Search threads get a larger stack than the default: the search recurses
/// once per ply.
const WORKER_STACK_SIZE: usize = 32 * 1024 * 1024;

/// Deepest iteration a search will start.
pub const MAX_SEARCH_DEPTH: i32 = (MAX_PLY / 2) as i32;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn search thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

/// How far and how long to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_depth: i32,
    /// `None` searches until the depth is reached or the search is aborted.
    pub time_limit: Option<Duration>,
}

impl SearchLimits {
    pub fn new(max_depth: i32, time_limit: Option<Duration>) -> Self {
        SearchLimits {
            max_depth,
            time_limit,
        }
    }

    pub fn depth(max_depth: i32) -> Self {
        SearchLimits::new(max_depth, None)
    }

    pub fn time(limit: Duration) -> Self {
        SearchLimits::new(MAX_SEARCH_DEPTH, Some(limit))
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits::new(MAX_SEARCH_DEPTH, None)
    }
}

/// Progress after a completed iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInfo {
    pub depth: i32,
    /// From the side to move's point of view.
    pub score: i32,
    pub nodes: u64,
    pub elapsed: Duration,
    pub pv: Vec<Move>,
    /// Permille of the hash table used by this search.
    pub hashfull: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    /// [`Move::NONE`] when the position has no legal move.
    pub best_move: Move,
    pub score: i32,
    /// Last completed iteration.
    pub depth: i32,
    pub nodes: u64,
    /// Nodes spent in re-searches after failed scouts.
    pub researched: u64,
}

/// Root of one search, handed to a worker by the balancer.
pub(crate) struct RootJob {
    pub board: Board,
    pub game: Arc<[u64]>,
    pub max_depth: i32,
    pub started: Instant,
    pub reports: Sender<Report>,
}

pub(crate) enum Report {
    Iteration(SearchInfo),
    Finished(SearchOutcome),
}

/// Stops a running search from another thread.
#[derive(Debug, Clone)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// The search returns its best move so far; the first iteration always completes.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

pub struct Engine {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
    config: EngineConfig,
}

impl Engine {
    /// Allocates the hash table and starts `config.threads` workers.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let config = config.clamped();
        init_magics();
        tables();

        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..config.threads).map(|_| bounded::<Assignment>(1)).unzip();
        let shared = Arc::new(Shared {
            tt: TranspositionTable::new(config.hash_mb),
            history: HistoryTable::new(),
            balancer: Balancer::new(senders),
            threads: config.threads,
            abort: Arc::new(AtomicBool::new(false)),
            abortable: AtomicBool::new(false),
            pawn_epoch: AtomicU64::new(0),
            next_sp: AtomicU64::new(0),
            researched: AtomicU64::new(0),
        });

        let mut handles = Vec::with_capacity(config.threads);
        for (index, assignments) in receivers.into_iter().enumerate() {
            let worker = Worker::new(index, Arc::clone(&shared), assignments);
            let spawned = std::thread::Builder::new()
                .name(format!("search-{index}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    shutdown(&shared, &mut handles);
                    return Err(EngineError::Spawn { index, source });
                }
            }
        }

        info!(
            threads = config.threads,
            hash_mb = config.hash_mb,
            slots = shared.tt.slots(),
            "engine started"
        );
        Ok(Engine {
            shared,
            handles,
            config,
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Searches `board` with no earlier game positions.
    pub fn search(
        &mut self,
        board: &Board,
        limits: SearchLimits,
        on_info: impl FnMut(&SearchInfo),
    ) -> SearchOutcome {
        self.search_with_history(board, &[], limits, on_info)
    }

    /// Searches `board`, counting repetitions of the positions in `game`
    /// (oldest first, ending with the position just before `board`).
    ///
    /// `on_info` is called after every completed iteration. The search ends
    /// at `limits.max_depth`, when the time limit expires, or when
    /// [`Engine::abort_search`] is called; it always finishes depth 1.
    pub fn search_with_history(
        &mut self,
        board: &Board,
        game: &[u64],
        limits: SearchLimits,
        mut on_info: impl FnMut(&SearchInfo),
    ) -> SearchOutcome {
        let started = Instant::now();
        self.shared.abort.store(false, Ordering::Relaxed);
        self.shared.abortable.store(false, Ordering::Relaxed);
        self.shared.researched.store(0, Ordering::Relaxed);
        self.shared.tt.new_search();
        self.shared.history.decay();

        let moves = legal_moves(board);
        let Some(fallback) = moves.iter().next() else {
            let score = if board.in_check() { -MATE } else { DRAW };
            info!(score, "no legal moves at the root");
            return SearchOutcome {
                best_move: Move::NONE,
                score,
                depth: 0,
                nodes: 0,
                researched: 0,
            };
        };

        let (reports, receiver) = unbounded();
        self.shared.balancer.assign_root(RootJob {
            board: board.clone(),
            game: Arc::from(game),
            max_depth: limits.max_depth.clamp(1, MAX_SEARCH_DEPTH),
            started,
            reports,
        });

        let mut deadline = limits.time_limit.map(|limit| started + limit);
        loop {
            let report = match deadline {
                Some(at) => receiver.recv_deadline(at),
                None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match report {
                Ok(Report::Iteration(info)) => on_info(&info),
                Ok(Report::Finished(outcome)) if outcome.best_move.is_none() => {
                    return SearchOutcome {
                        best_move: fallback,
                        ..outcome
                    };
                }
                Ok(Report::Finished(outcome)) => return outcome,
                Err(RecvTimeoutError::Timeout) => {
                    self.abort_search();
                    deadline = None;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("search worker exited without a result");
                    return SearchOutcome {
                        best_move: fallback,
                        score: 0,
                        depth: 0,
                        nodes: 0,
                        researched: 0,
                    };
                }
            }
        }
    }

    pub fn abort_search(&self) {
        self.shared.abort.store(true, Ordering::Relaxed);
    }

    /// A handle that aborts this engine's searches from any thread.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(Arc::clone(&self.shared.abort))
    }

    /// Forgets everything learned: hash table, history and pawn caches.
    pub fn new_game(&mut self) {
        self.shared.tt.clear();
        self.shared.history.clear();
        self.shared.pawn_epoch.fetch_add(1, Ordering::Release);
    }

    /// Restarts the workers and reallocates the hash table for `config`.
    pub fn resize(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        if config.clamped() == self.config {
            return Ok(());
        }
        *self = Engine::new(config)?;
        Ok(())
    }
}

fn shutdown(shared: &Shared, handles: &mut Vec<JoinHandle<()>>) {
    shared.balancer.quit_all();
    for handle in handles.drain(..) {
        if handle.join().is_err() {
            warn!("search worker panicked");
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.abort_search();
        shutdown(&self.shared, &mut self.handles);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("tt", &self.shared.tt)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(threads: usize) -> Engine {
        Engine::new(EngineConfig {
            threads,
            hash_mb: 4,
        })
        .unwrap()
    }

    #[test]
    fn terminal_positions_have_no_move() {
        let mut engine = engine(1);
        let mated = Board::from_fen("R5k1/5ppp/8/8/8/8/5PPP/6K1 b - - 0 1").unwrap();
        let outcome = engine.search(&mated, SearchLimits::depth(4), |_| {});
        assert!(outcome.best_move.is_none());
        assert_eq!(outcome.score, -MATE);

        let stalemate = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let outcome = engine.search(&stalemate, SearchLimits::depth(4), |_| {});
        assert!(outcome.best_move.is_none());
        assert_eq!(outcome.score, DRAW);
    }

    #[test]
    fn limits_constructors() {
        assert_eq!(SearchLimits::depth(5).time_limit, None);
        let timed = SearchLimits::time(Duration::from_millis(30));
        assert_eq!(timed.max_depth, MAX_SEARCH_DEPTH);
        assert_eq!(timed.time_limit, Some(Duration::from_millis(30)));
    }

    #[test]
    fn reports_every_iteration() {
        let mut engine = engine(1);
        let mut depths = Vec::new();
        let outcome = engine.search(&Board::startpos(), SearchLimits::depth(4), |info| {
            depths.push(info.depth);
            assert!(!info.pv.is_empty());
        });
        assert_eq!(depths, vec![1, 2, 3, 4]);
        assert_eq!(outcome.depth, 4);
        assert!(Board::startpos().find_move(&outcome.best_move.to_uci()).is_some());
    }

    #[test]
    fn new_game_and_resize() {
        let mut engine = engine(1);
        engine.search(&Board::startpos(), SearchLimits::depth(3), |_| {});
        engine.new_game();
        engine
            .resize(EngineConfig {
                threads: 2,
                hash_mb: 8,
            })
            .unwrap();
        assert_eq!(engine.config().threads, 2);
        let outcome = engine.search(&Board::startpos(), SearchLimits::depth(3), |_| {});
        assert!(!outcome.best_move.is_none());
    }
}
