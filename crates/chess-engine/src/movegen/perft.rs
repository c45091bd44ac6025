//! Perft (performance test) for move generator validation.
//!
//! Perft counts the leaf nodes of the legal move tree to a fixed depth. The
//! counts for a handful of well-known positions are published, so any bug in
//! generation, legality or make/unmake shows up as a mismatch.

use super::legal_moves;
use crate::Board;

/// Counts the leaf nodes at the given depth.
pub fn perft(board: &mut Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = legal_moves(board);
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0u64;
    for mv in moves.iter() {
        let memento = board.make(mv);
        nodes += perft(board, depth - 1);
        board.unmake(mv, memento);
    }
    nodes
}

/// Node counts below each root move, sorted by move text.
/// Useful for finding which move disagrees with a reference engine.
pub fn perft_divide(board: &mut Board, depth: u32) -> Vec<(String, u64)> {
    let moves = legal_moves(board);
    let mut results = Vec::with_capacity(moves.len());

    for mv in moves.iter() {
        let memento = board.make(mv);
        let nodes = if depth > 1 { perft(board, depth - 1) } else { 1 };
        board.unmake(mv, memento);
        results.push((mv.to_uci(), nodes));
    }

    results.sort_by(|a, b| a.0.cmp(&b.0));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 0 1";

    fn count(fen: &str, depth: u32) -> u64 {
        let mut board = Board::from_fen(fen).unwrap();
        let before = board.clone();
        let nodes = perft(&mut board, depth);
        assert_eq!(board, before, "board not restored after perft");
        nodes
    }

    #[test]
    fn perft_startpos_shallow() {
        let mut board = Board::startpos();
        assert_eq!(perft(&mut board, 1), 20);
        assert_eq!(perft(&mut board, 2), 400);
        assert_eq!(perft(&mut board, 3), 8902);
    }

    #[test]
    fn perft_startpos_depth_4() {
        let mut board = Board::startpos();
        assert_eq!(perft(&mut board, 4), 197_281);
    }

    // Depth 5 and 6 are slow in debug builds
    #[test]
    #[ignore]
    fn perft_startpos_depth_5() {
        let mut board = Board::startpos();
        assert_eq!(perft(&mut board, 5), 4_865_609);
    }

    #[test]
    #[ignore]
    fn perft_startpos_depth_6() {
        let mut board = Board::startpos();
        assert_eq!(perft(&mut board, 6), 119_060_324);
    }

    // Kiwipete: castling, pins and en passant in one position
    #[test]
    fn perft_kiwipete() {
        assert_eq!(count(KIWIPETE, 1), 48);
        assert_eq!(count(KIWIPETE, 2), 2039);
        assert_eq!(count(KIWIPETE, 3), 97_862);
    }

    // Check evasion, en passant and a horizontal pin through two pawns
    #[test]
    fn perft_position3() {
        assert_eq!(count(POSITION_3, 1), 14);
        assert_eq!(count(POSITION_3, 2), 191);
        assert_eq!(count(POSITION_3, 3), 2812);
    }

    // Promotions and captures while in check
    #[test]
    fn perft_position4() {
        assert_eq!(count(POSITION_4, 1), 6);
        assert_eq!(count(POSITION_4, 2), 264);
        assert_eq!(count(POSITION_4, 3), 9467);
    }

    #[test]
    fn perft_position5() {
        assert_eq!(count(POSITION_5, 1), 44);
        assert_eq!(count(POSITION_5, 2), 1486);
        assert_eq!(count(POSITION_5, 3), 62_379);
    }

    #[test]
    fn perft_divide_sums_to_perft() {
        let mut board = Board::from_fen(KIWIPETE).unwrap();
        let results = perft_divide(&mut board, 2);
        assert_eq!(results.len(), 48);
        let total: u64 = results.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 2039);
        assert!(results.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
