//! Staged move selection.
//!
//! A selector hands out one legal move at a time, generating each stage only
//! when the previous one is used up, so a node that cuts off early never
//! pays for its quiet moves. Full-width nodes go
//! `First → Winning → Remaining → Done`; quiescence nodes go
//! `QWinning → QRemaining → QChecks → Done`.

use crate::history::HistoryTable;
use chess_core::{Color, Move, Piece};
use chess_engine::exchange::pinned_pieces;
use chess_engine::movegen::{
    get_captures, get_checks, get_evasions, get_non_captures, is_legal, MoveList,
    MVV_LVA_SHIFT,
};
use chess_engine::{Bitboard, Board};

/// Quiet-move key bits for the newer and the older killer.
pub const KILLER_KEYS: [u64; 2] = [2 << MVV_LVA_SHIFT, 1 << MVV_LVA_SHIFT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The hash or IID move.
    First,
    /// Evasions when in check, otherwise captures and promotions that do not lose material.
    Winning,
    /// Quiet moves, then losing captures.
    Remaining,
    QWinning,
    QRemaining,
    QChecks,
    Done,
}

/// Takes the best remaining move from `list` that passes the legality filter.
fn pick(list: &mut MoveList, board: &Board, pinned: Bitboard, skip: Move) -> Option<Move> {
    while let Some(scored) = list.take_best() {
        let mv = scored.mv;
        if mv == skip {
            continue;
        }
        if is_legal(board, mv, pinned) {
            return Some(mv);
        }
    }
    None
}

#[derive(Clone)]
pub struct FullSelector {
    stage: Stage,
    first: Move,
    killers: [Move; 2],
    side: Color,
    in_check: bool,
    pinned: Bitboard,
    winning: MoveList,
    losing: MoveList,
    quiets: MoveList,
    winning_ready: bool,
    quiets_ready: bool,
}

impl FullSelector {
    fn next(&mut self, board: &Board, history: &HistoryTable) -> Option<Move> {
        loop {
            match self.stage {
                Stage::First => {
                    self.stage = Stage::Winning;
                    let first = self.first;
                    if !first.is_none()
                        && board.is_pseudo_legal(first)
                        && is_legal(board, first, self.pinned)
                    {
                        return Some(first);
                    }
                    self.first = Move::NONE;
                }
                Stage::Winning => {
                    if !self.winning_ready {
                        self.winning_ready = true;
                        if self.in_check {
                            get_evasions(board, &mut self.winning);
                        } else {
                            get_captures(board, &mut self.winning, &mut self.losing);
                        }
                    }
                    if let Some(mv) = pick(&mut self.winning, board, self.pinned, self.first) {
                        return Some(mv);
                    }
                    self.stage = Stage::Remaining;
                }
                Stage::Remaining => {
                    if !self.quiets_ready {
                        self.quiets_ready = true;
                        if !self.in_check {
                            self.order_quiets(board, history);
                        }
                    }
                    if let Some(mv) = pick(&mut self.quiets, board, self.pinned, self.first) {
                        return Some(mv);
                    }
                    if let Some(mv) = pick(&mut self.losing, board, self.pinned, self.first) {
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }
                _ => return None,
            }
        }
    }

    fn order_quiets(&mut self, board: &Board, history: &HistoryTable) {
        get_non_captures(board, &mut self.quiets);
        history.score_moves(self.side, self.quiets.as_mut_slice());
        for scored in self.quiets.as_mut_slice() {
            if scored.mv == self.killers[0] {
                scored.key |= KILLER_KEYS[0];
            } else if scored.mv == self.killers[1] {
                scored.key |= KILLER_KEYS[1];
            }
        }
    }
}

#[derive(Clone)]
pub struct QuiescenceSelector {
    stage: Stage,
    in_check: bool,
    with_checks: bool,
    generated: bool,
    pinned: Bitboard,
    winning: MoveList,
    losing: MoveList,
    checks: MoveList,
}

impl QuiescenceSelector {
    fn next(&mut self, board: &Board) -> Option<Move> {
        loop {
            match self.stage {
                Stage::QWinning => {
                    if !self.generated {
                        self.generated = true;
                        if self.in_check {
                            get_evasions(board, &mut self.winning);
                        } else {
                            get_captures(board, &mut self.winning, &mut self.losing);
                        }
                    }
                    if let Some(mv) = pick(&mut self.winning, board, self.pinned, Move::NONE) {
                        return Some(mv);
                    }
                    self.stage = Stage::QRemaining;
                }
                Stage::QRemaining => {
                    // Under-promotions are left out of quiescence.
                    while let Some(scored) = self.losing.take_best() {
                        let mv = scored.mv;
                        if matches!(mv.promoted(), Some(p) if p != Piece::Queen) {
                            continue;
                        }
                        if is_legal(board, mv, self.pinned) {
                            return Some(mv);
                        }
                    }
                    self.stage = Stage::QChecks;
                    if self.with_checks && !self.in_check {
                        get_checks(board, &mut self.checks);
                    }
                }
                Stage::QChecks => {
                    if let Some(mv) = pick(&mut self.checks, board, self.pinned, Move::NONE) {
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }
                _ => return None,
            }
        }
    }
}

/// Move ordering for one node.
#[derive(Clone)]
pub enum MoveSelector {
    Full(Box<FullSelector>),
    Quiescence(Box<QuiescenceSelector>),
}

impl MoveSelector {
    /// Selector for a full-width node. `first` is tried before anything is
    /// generated if it is legal here; `killers` are boosted among the quiets.
    pub fn full(board: &Board, first: Move, killers: [Move; 2]) -> Self {
        let side = board.side_to_move();
        MoveSelector::Full(Box::new(FullSelector {
            stage: Stage::First,
            first,
            killers,
            side,
            in_check: board.in_check(),
            pinned: pinned_pieces(board, side),
            winning: MoveList::new(),
            losing: MoveList::new(),
            quiets: MoveList::new(),
            winning_ready: false,
            quiets_ready: false,
        }))
    }

    /// Selector for a quiescence node; quiet checks are added when `with_checks`.
    pub fn quiescence(board: &Board, with_checks: bool) -> Self {
        let side = board.side_to_move();
        MoveSelector::Quiescence(Box::new(QuiescenceSelector {
            stage: Stage::QWinning,
            in_check: board.in_check(),
            with_checks,
            generated: false,
            pinned: pinned_pieces(board, side),
            winning: MoveList::new(),
            losing: MoveList::new(),
            checks: MoveList::new(),
        }))
    }

    /// The next legal move, or `None` once every stage is exhausted.
    pub fn next(&mut self, board: &Board, history: &HistoryTable) -> Option<Move> {
        match self {
            MoveSelector::Full(selector) => selector.next(board, history),
            MoveSelector::Quiescence(selector) => selector.next(board),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            MoveSelector::Full(selector) => selector.stage,
            MoveSelector::Quiescence(selector) => selector.stage,
        }
    }
}

impl std::fmt::Debug for MoveSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MoveSelector").field(&self.stage()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_engine::legal_moves;

    const POSITIONS: [&str; 6] = [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 0 1",
        "4k3/8/8/8/1b6/8/2N5/r3K3 w - - 0 1",
    ];

    fn drain(selector: &mut MoveSelector, board: &Board) -> Vec<Move> {
        let history = HistoryTable::new();
        let mut out = Vec::new();
        while let Some(mv) = selector.next(board, &history) {
            out.push(mv);
        }
        assert_eq!(selector.stage(), Stage::Done);
        out
    }

    fn sorted(mut moves: Vec<Move>) -> Vec<u32> {
        let mut raw: Vec<u32> = moves.drain(..).map(Move::raw).collect();
        raw.sort_unstable();
        raw
    }

    #[test]
    fn every_legal_move_exactly_once() {
        for fen in POSITIONS {
            let board = Board::from_fen(fen).unwrap();
            let legal: Vec<Move> = legal_moves(&board).iter().collect();

            let mut plain = MoveSelector::full(&board, Move::NONE, [Move::NONE; 2]);
            assert_eq!(sorted(drain(&mut plain, &board)), sorted(legal.clone()), "{fen}");

            // A hash move and killers taken from the legal list change only the order.
            let first = *legal.last().unwrap();
            let killers = [legal[0], legal[legal.len() / 2]];
            let mut seeded = MoveSelector::full(&board, first, killers);
            let emitted = drain(&mut seeded, &board);
            assert_eq!(emitted[0], first);
            assert_eq!(sorted(emitted), sorted(legal), "{fen}");
        }
    }

    #[test]
    fn bogus_hash_move_is_ignored() {
        let board = Board::startpos();
        let bogus = Move::new(
            chess_core::Square::from_algebraic("e4").unwrap(),
            chess_core::Square::from_algebraic("e5").unwrap(),
            Piece::Pawn,
            None,
            None,
        );
        let mut selector = MoveSelector::full(&board, bogus, [bogus; 2]);
        assert_eq!(drain(&mut selector, &board).len(), 20);
    }

    #[test]
    fn captures_come_before_quiets_and_killers_lead_the_quiets() {
        let board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let killer = board.find_move("a2a3").unwrap();
        let mut selector = MoveSelector::full(&board, Move::NONE, [killer, Move::NONE]);
        let emitted = drain(&mut selector, &board);

        let first_quiet = emitted.iter().position(|m| m.is_quiet()).unwrap();
        assert_eq!(emitted[first_quiet], killer);
        // Winning captures precede the quiets.
        assert!(emitted[..first_quiet].iter().all(|m| !m.is_quiet()));
        // Qxf6 gives up the queen for a knight: it comes after the quiets.
        let qxf6 = board.find_move("f3f6").unwrap();
        assert!(emitted.iter().position(|&m| m == qxf6).unwrap() > first_quiet);
    }

    #[test]
    fn quiescence_emits_captures_and_queen_promotions() {
        for fen in POSITIONS {
            let board = Board::from_fen(fen).unwrap();
            let history = HistoryTable::new();
            let mut selector = MoveSelector::quiescence(&board, false);
            let mut emitted = Vec::new();
            while let Some(mv) = selector.next(&board, &history) {
                emitted.push(mv);
            }
            let expected: Vec<Move> = legal_moves(&board)
                .iter()
                .filter(|m| {
                    board.in_check()
                        || m.promoted() == Some(Piece::Queen)
                        || (m.is_capture() && !m.is_promotion())
                })
                .collect();
            assert_eq!(sorted(emitted), sorted(expected), "{fen}");
        }
    }

    #[test]
    fn quiescence_checks_are_checks() {
        let board = Board::from_fen("4k3/8/8/8/8/8/4B3/4RK2 w - - 0 1").unwrap();
        let history = HistoryTable::new();
        let mut selector = MoveSelector::quiescence(&board, true);
        let mut count = 0;
        while let Some(mv) = selector.next(&board, &history) {
            let mut after = board.clone();
            after.make(mv);
            assert!(after.in_check(), "{mv} does not check");
            count += 1;
        }
        assert!(count > 0);
    }
}
