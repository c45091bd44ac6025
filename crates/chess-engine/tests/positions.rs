//! Board behaviour through the public API: FEN, incremental keys, perft.

use chess_engine::{legal_moves, perft, perft_divide, Board};
use proptest::prelude::*;

const POSITIONS: &[&str] = &[
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
];

fn board(fen: &str) -> Board {
    Board::from_fen(fen).expect("test FEN should parse")
}

#[test]
fn test_fen_round_trip() {
    for fen in POSITIONS {
        assert_eq!(board(fen).to_fen(), *fen, "round trip of {fen}");
    }
}

#[test]
fn test_four_field_fen_defaults_clocks() {
    let b = board("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq -");
    assert_eq!(b.halfmove_clock(), 0);
    assert!(b.to_fen().ends_with(" 0 1"));
}

#[test]
fn test_standard_perft_counts() {
    let expected = [(0, 2, 400), (1, 2, 2_039), (2, 3, 2_812), (3, 2, 264), (4, 2, 1_486)];
    for (index, depth, nodes) in expected {
        let mut b = board(POSITIONS[index]);
        assert_eq!(perft(&mut b, depth), nodes, "perft({depth}) of {}", POSITIONS[index]);
    }
}

#[test]
fn test_divide_lists_every_root_move() {
    let mut b = board(POSITIONS[1]);
    let divide = perft_divide(&mut b, 1);
    assert_eq!(divide.len(), 48);
    assert_eq!(divide.iter().map(|(_, n)| n).sum::<u64>(), 48);
}

#[test]
fn test_find_move_needs_a_legal_move() {
    let b = board(POSITIONS[0]);
    assert!(b.find_move("e2e4").is_some());
    assert!(b.find_move("e2e5").is_none());
    assert!(b.find_move("e7e5").is_none());
    assert!(b.find_move("nonsense").is_none());
}

proptest! {
    #[test]
    fn incremental_keys_match_a_fresh_board(
        start in 0usize..POSITIONS.len(),
        path in proptest::collection::vec(0usize..256, 0..16),
    ) {
        let mut b = board(POSITIONS[start]);
        for choice in path {
            let moves = legal_moves(&b);
            if moves.is_empty() {
                break;
            }
            b.make(moves.as_slice()[choice % moves.len()].mv);
            let fresh = board(&b.to_fen());
            prop_assert_eq!(b.key(), fresh.key(), "key after reaching {}", b.to_fen());
            prop_assert_eq!(b.pawn_key(), fresh.pawn_key());
        }
    }
}
