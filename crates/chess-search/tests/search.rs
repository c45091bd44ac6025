//! End-to-end searches through the public engine API.

use chess_engine::{see, Board};
use chess_search::{Engine, EngineConfig, SearchLimits, MATE, MAX_PLY};
use std::time::{Duration, Instant};

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

fn engine(threads: usize) -> Engine {
    Engine::new(EngineConfig {
        threads,
        hash_mb: 8,
    })
    .expect("engine should start")
}

fn board(fen: &str) -> Board {
    Board::from_fen(fen).expect("test FEN should parse")
}

#[test]
fn test_depth_one_searches_every_root_move() {
    let mut engine = engine(1);
    let mut infos = Vec::new();
    let outcome = engine.search(
        &board(STARTPOS),
        SearchLimits::new(1, Some(Duration::from_secs(1))),
        |info| infos.push(info.clone()),
    );

    assert_eq!(outcome.depth, 1);
    assert_eq!(outcome.nodes, 20, "one node per root move, no quiescence moves");
    assert_eq!(infos.len(), 1, "one info per iteration");
    assert!(board(STARTPOS).find_move(&outcome.best_move.to_uci()).is_some());
}

#[test]
fn test_rook_endgame_is_winning() {
    let mut engine = engine(2);
    let position = board("4k3/8/8/8/8/8/R7/4K3 w - - 0 1");
    let outcome = engine.search(
        &position,
        SearchLimits::new(6, Some(Duration::from_secs(5))),
        |_| {},
    );

    assert!(
        outcome.score >= 400,
        "KRK should score at least 400, got {}",
        outcome.score
    );
    let mut after = position.clone();
    after.make(outcome.best_move);
    assert!(!after.has_no_legal_moves(), "{} stalemates", outcome.best_move);
}

#[test]
fn test_mate_in_one_is_found_at_depth_one() {
    let mut engine = engine(1);
    let position = board("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");
    let mut first_score = None;
    let outcome = engine.search(&position, SearchLimits::depth(3), |info| {
        first_score.get_or_insert(info.score);
    });

    let first_score = first_score.expect("at least one iteration");
    assert!(first_score >= MATE - 2 * MAX_PLY as i32, "got {first_score}");
    assert_eq!(outcome.best_move.to_uci(), "a1a8");
}

#[test]
fn test_parallel_search_finds_mate_in_one() {
    let mut engine = engine(4);
    let position = board("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");
    let outcome = engine.search(&position, SearchLimits::depth(5), |_| {});
    assert_eq!(outcome.best_move.to_uci(), "a1a8");
    assert_eq!(outcome.score, MATE - 1);
}

#[test]
fn test_single_thread_search_is_deterministic() {
    let kiwipete = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    let first = engine(1).search(&board(kiwipete), SearchLimits::depth(4), |_| {});
    let second = engine(1).search(&board(kiwipete), SearchLimits::depth(4), |_| {});

    assert_eq!(first.best_move, second.best_move);
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.score, second.score);
}

#[test]
fn test_shared_table_under_contention() {
    let position = board(STARTPOS);
    for threads in [4, 1] {
        let mut engine = engine(threads);
        let outcome = engine.search(&position, SearchLimits::time(Duration::from_secs(2)), |_| {});
        let mv = outcome.best_move;
        assert!(position.find_move(&mv.to_uci()).is_some(), "{threads} threads: {mv}");
        assert!(
            see(&position, mv.from(), mv.to(), mv.captured()) >= 0,
            "{threads} threads: {mv} loses material"
        );
        assert!(outcome.nodes > 0);
        assert!(outcome.depth >= 1);
    }
}

#[test]
fn test_time_limit_aborts_deep_search() {
    let mut engine = engine(2);
    let started = Instant::now();
    let outcome = engine.search(
        &board(STARTPOS),
        SearchLimits::new(64, Some(Duration::from_millis(50))),
        |_| {},
    );
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_millis(200),
        "search took {elapsed:?}"
    );
    assert!(outcome.depth >= 1);
    assert!(!outcome.best_move.is_none());
}

#[test]
fn test_abort_handle_stops_an_unbounded_search() {
    let mut engine = engine(2);
    let handle = engine.abort_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        handle.abort();
    });
    let outcome = engine.search(&board(STARTPOS), SearchLimits::depth(64), |_| {});
    stopper.join().expect("stopper thread");

    assert!(outcome.depth >= 1);
    assert!(outcome.depth < 64);
    assert!(!outcome.best_move.is_none());
}

#[test]
fn test_repetition_with_game_history_is_a_draw() {
    // Black is a queen up; repeating the position is white's best result.
    let position = board("4k3/8/8/3q4/8/8/8/N3K3 w - - 20 60");
    let escape = position.find_move("e1e2").expect("e1e2 is legal");
    let mut after = position.clone();
    after.make(escape);
    let repeated = after.key();

    let mut engine = engine(1);
    let outcome =
        engine.search_with_history(&position, &[1, repeated, 2, repeated], SearchLimits::depth(3), |_| {});

    assert_eq!(outcome.best_move, escape);
    assert_eq!(outcome.score, 0);
}

#[test]
fn test_new_game_resets_learning() {
    let mut engine = engine(1);
    let position = board(STARTPOS);
    let fresh = engine.search(&position, SearchLimits::depth(4), |_| {});
    engine.search(&board("4k3/8/8/8/8/8/R7/4K3 w - - 0 1"), SearchLimits::depth(4), |_| {});

    engine.new_game();
    let reset = engine.search(&position, SearchLimits::depth(4), |_| {});
    assert_eq!(reset.best_move, fresh.best_move, "a reset engine replays a fresh one");
    assert_eq!(reset.nodes, fresh.nodes);
}

#[test]
fn test_config_from_toml() {
    let config = EngineConfig::from_toml_str("threads = 3\nhash_mb = 32\n").expect("valid config");
    assert_eq!(config.threads, 3);
    assert_eq!(config.hash_mb, 32);
    let mut engine = Engine::new(config).expect("engine should start");
    let outcome = engine.search(&board(STARTPOS), SearchLimits::depth(3), |_| {});
    assert!(!outcome.best_move.is_none());
}
