//! Turning a `go` command into search limits.

use chess_search::{SearchLimits, MAX_SEARCH_DEPTH};
use std::time::Duration;
use uci::GoOptions;

/// Assumed moves left when the GUI does not say.
const DEFAULT_MOVES_TO_GO: u64 = 30;
/// Kept back for move transmission and GUI lag.
const SAFETY_MARGIN_MS: u64 = 20;
const MIN_THINK_MS: u64 = 10;

pub fn limits(opts: &GoOptions, white_to_move: bool) -> SearchLimits {
    let depth = opts
        .depth
        .map_or(MAX_SEARCH_DEPTH, |d| d.min(MAX_SEARCH_DEPTH as u32).max(1) as i32);
    SearchLimits::new(depth, think_time(opts, white_to_move))
}

/// `None` means search until `stop` or the depth cap.
pub fn think_time(opts: &GoOptions, white_to_move: bool) -> Option<Duration> {
    if let Some(ms) = opts.movetime {
        return Some(Duration::from_millis(ms));
    }
    if opts.infinite {
        return None;
    }

    let (remaining, increment) = opts.clock(white_to_move);
    let remaining = remaining?;
    let moves = opts.movestogo.map_or(DEFAULT_MOVES_TO_GO, |n| u64::from(n.max(1)));
    let budget = (remaining / moves + increment.unwrap_or(0) / 2)
        .min(remaining)
        .saturating_sub(SAFETY_MARGIN_MS)
        .max(MIN_THINK_MS);
    Some(Duration::from_millis(budget))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(wtime: u64, btime: u64) -> GoOptions {
        GoOptions {
            wtime: Some(wtime),
            btime: Some(btime),
            ..GoOptions::default()
        }
    }

    #[test]
    fn movetime_wins() {
        let opts = GoOptions {
            movetime: Some(750),
            wtime: Some(1_000),
            ..GoOptions::default()
        };
        assert_eq!(think_time(&opts, true), Some(Duration::from_millis(750)));
    }

    #[test]
    fn remaining_time_is_split_over_moves_to_go() {
        let opts = clock(60_000, 30_000);
        assert_eq!(think_time(&opts, true), Some(Duration::from_millis(1_980)));
        assert_eq!(think_time(&opts, false), Some(Duration::from_millis(980)));

        let opts = GoOptions {
            movestogo: Some(10),
            ..clock(60_000, 30_000)
        };
        assert_eq!(think_time(&opts, true), Some(Duration::from_millis(5_980)));
    }

    #[test]
    fn half_the_increment_is_added() {
        let opts = GoOptions {
            winc: Some(2_000),
            ..clock(30_000, 30_000)
        };
        assert_eq!(think_time(&opts, true), Some(Duration::from_millis(1_980)));
        assert_eq!(think_time(&opts, false), Some(Duration::from_millis(980)));
    }

    #[test]
    fn short_clocks_are_floored_and_capped() {
        assert_eq!(
            think_time(&clock(100, 100), true),
            Some(Duration::from_millis(MIN_THINK_MS))
        );
        let opts = GoOptions {
            movestogo: Some(1),
            winc: Some(10_000),
            ..clock(1_000, 1_000)
        };
        assert_eq!(think_time(&opts, true), Some(Duration::from_millis(980)));
    }

    #[test]
    fn no_clock_means_no_deadline() {
        let infinite = GoOptions {
            infinite: true,
            wtime: Some(5_000),
            ..GoOptions::default()
        };
        assert_eq!(think_time(&infinite, true), None);
        assert_eq!(think_time(&GoOptions::default(), true), None);
    }

    #[test]
    fn depth_is_capped() {
        let opts = GoOptions {
            depth: Some(500),
            ..GoOptions::default()
        };
        assert_eq!(limits(&opts, true).max_depth, MAX_SEARCH_DEPTH);
        let opts = GoOptions {
            depth: Some(0),
            ..GoOptions::default()
        };
        assert_eq!(limits(&opts, true).max_depth, 1);
        assert_eq!(limits(&GoOptions::default(), true).max_depth, MAX_SEARCH_DEPTH);
    }
}
