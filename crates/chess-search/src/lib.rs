//! Parallel alpha-beta search.
//!
//! This crate provides:
//! - [`Engine`] - owns the worker threads and runs iterative deepening
//! - [`evaluate`] - tapered static evaluation with a per-worker pawn cache
//! - [`TranspositionTable`] - lockless shared hash of search results
//! - [`MoveSelector`] - staged move ordering for full-width and quiescence nodes
//!
//! The search is Young Brothers Wait: every node searches its first move
//! alone, then may become a split point that idle workers join to search
//! the remaining moves in parallel.
//!
//! # Example
//!
//! ```no_run
//! use chess_engine::Board;
//! use chess_search::{Engine, EngineConfig, SearchLimits};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! let outcome = engine.search(&Board::startpos(), SearchLimits::depth(6), |info| {
//!     println!("depth {} score {}", info.depth, info.score);
//! });
//! println!("bestmove {}", outcome.best_move);
//! ```

mod balancer;
mod config;
mod engine;
pub mod eval;
pub mod history;
pub mod pawns;
mod search;
pub mod selector;
mod split;
pub mod stack;
pub mod tt;
mod worker;

pub use config::{ConfigError, EngineConfig, MAX_HASH_MB, MAX_THREADS};
pub use engine::{
    AbortHandle, Engine, EngineError, SearchInfo, SearchLimits, SearchOutcome, MAX_SEARCH_DEPTH,
};
pub use eval::evaluate;
pub use history::HistoryTable;
pub use pawns::PawnCache;
pub use selector::MoveSelector;
pub use tt::{Bound, TranspositionTable};

/// Deepest ply the search will reach, quiescence included.
pub const MAX_PLY: usize = 128;
/// Score of mate at the root; mate in `n` plies scores `MATE - n`.
pub const MATE: i32 = 32_000;
/// Bound larger than any score.
pub const INF: i32 = 32_500;
pub const DRAW: i32 = 0;

/// Scores this close to [`MATE`] are mate announcements.
pub const MATE_BOUND: i32 = MATE - MAX_PLY as i32;

/// True for a score that announces mate for either side.
#[inline]
pub const fn is_mate_score(score: i32) -> bool {
    score >= MATE_BOUND || score <= -MATE_BOUND
}

/// Moves to mate for a mate score, negative when the side to move is mated.
pub fn mate_in(score: i32) -> Option<i32> {
    if score >= MATE_BOUND {
        Some((MATE - score + 1) / 2)
    } else if score <= -MATE_BOUND {
        Some(-(MATE + score + 1) / 2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_distances() {
        assert_eq!(mate_in(MATE - 1), Some(1));
        assert_eq!(mate_in(MATE - 3), Some(2));
        assert_eq!(mate_in(-MATE + 2), Some(-1));
        assert_eq!(mate_in(250), None);
        assert!(is_mate_score(-MATE + 40));
        assert!(!is_mate_score(INF - MATE));
    }
}
