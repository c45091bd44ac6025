//! Staged pseudo-legal move generation.
//!
//! The search asks for moves in stages: captures and promotions (split by
//! exchange value into winning and losing lists), quiet moves, check
//! evasions and, in quiescence, quiet checking moves. Every generated move
//! carries a sort key; the caller picks the highest key first. Legality is
//! checked separately by [`is_legal`] so moves that are never tried are
//! never validated.

mod attacks;
mod magics;
pub mod perft;

use crate::exchange::{pinned_pieces, see, SEE_MIN};
use crate::tables::tables;
use crate::{Bitboard, Board};
use chess_core::{Color, Move, Piece, Square, UciMove};

pub use attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks,
};
pub use magics::init as init_magics;

/// Sort-key flag for queen promotions that do not lose material.
pub const PROMOTION_KEY: u64 = 1 << 28;
/// Shift of the MVV/LVA field in a sort key.
pub const MVV_LVA_SHIFT: u32 = 22;
/// Bonus for castling among quiet moves.
pub const CASTLE_KEY: u64 = 1;

/// Most-valuable-victim / least-valuable-attacker rank, at most 48.
#[inline]
pub fn mvv_lva(victim: Option<Piece>, attacker: Piece) -> u64 {
    let victim = victim.map_or(0, |v| v.index() as u64 + 1);
    (victim << 3).saturating_sub(attacker.index() as u64)
}

/// A move and the key it is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoredMove {
    pub mv: Move,
    pub key: u64,
}

/// A fixed-capacity list of scored moves.
#[derive(Clone)]
pub struct MoveList {
    moves: [ScoredMove; Self::MAX_MOVES],
    len: usize,
}

impl MoveList {
    /// No position has more than 218 legal moves.
    pub const MAX_MOVES: usize = 256;

    #[inline]
    pub const fn new() -> Self {
        MoveList {
            moves: [ScoredMove {
                mv: Move::NONE,
                key: 0,
            }; Self::MAX_MOVES],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, mv: Move, key: u64) {
        debug_assert!(self.len < Self::MAX_MOVES);
        if self.len < Self::MAX_MOVES {
            self.moves[self.len] = ScoredMove { mv, key };
            self.len += 1;
        }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn as_slice(&self) -> &[ScoredMove] {
        &self.moves[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [ScoredMove] {
        &mut self.moves[..self.len]
    }

    /// The moves, in list order.
    pub fn iter(&self) -> impl Iterator<Item = Move> + '_ {
        self.as_slice().iter().map(|s| s.mv)
    }

    pub fn contains(&self, mv: Move) -> bool {
        self.iter().any(|m| m == mv)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(Move) -> bool) {
        let mut write = 0;
        for read in 0..self.len {
            if keep(self.moves[read].mv) {
                self.moves[write] = self.moves[read];
                write += 1;
            }
        }
        self.len = write;
    }

    /// Removes and returns the entry with the highest key.
    ///
    /// One pass of selection sort: moves that are never asked for are never sorted.
    pub fn take_best(&mut self) -> Option<ScoredMove> {
        if self.len == 0 {
            return None;
        }
        let mut best = 0;
        for i in 1..self.len {
            if self.moves[i].key > self.moves[best].key {
                best = i;
            }
        }
        let taken = self.moves[best];
        // Keep the remaining order stable so ties resolve by generation order.
        self.moves.copy_within(best + 1..self.len, best);
        self.len -= 1;
        Some(taken)
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MoveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Pawns of `side` that promote with their next step.
#[inline]
fn seventh_rank(side: Color) -> Bitboard {
    match side {
        Color::White => Bitboard::RANK_7,
        Color::Black => Bitboard::RANK_2,
    }
}

/// Squares a pawn reaches by a double push.
#[inline]
fn double_push_rank(side: Color) -> Bitboard {
    match side {
        Color::White => Bitboard(Bitboard::RANK_3.0 << 8),
        Color::Black => Bitboard(Bitboard::RANK_6.0 >> 8),
    }
}

/// Pseudo-legal attacks of `piece` standing on `from`.
#[inline]
fn piece_attacks(piece: Piece, from: Square, side: Color, occ: Bitboard) -> Bitboard {
    match piece {
        Piece::Pawn => pawn_attacks(from, side),
        Piece::Knight => knight_attacks(from),
        Piece::Bishop => bishop_attacks(from, occ),
        Piece::Rook => rook_attacks(from, occ),
        Piece::Queen => queen_attacks(from, occ),
        Piece::King => king_attacks(from),
    }
}

const OFFICERS: [Piece; 5] = [
    Piece::Knight,
    Piece::Bishop,
    Piece::Rook,
    Piece::Queen,
    Piece::King,
];

/// Scores a capture or promotion by exchange value and files it into the
/// winning or losing list.
fn route_capture(board: &Board, mv: Move, winning: &mut MoveList, losing: &mut MoveList) {
    let order = mvv_lva(mv.captured(), mv.piece()) << MVV_LVA_SHIFT;
    let exchange = see(board, mv.from(), mv.to(), mv.captured());
    let tiebreak = (exchange - SEE_MIN) as u64;
    match mv.promoted() {
        Some(Piece::Queen) if exchange >= 0 => winning.push(mv, PROMOTION_KEY | order | tiebreak),
        Some(Piece::Queen) => losing.push(mv, order | tiebreak),
        // Under-promotions are almost never best; try them last.
        Some(_) => losing.push(mv, tiebreak),
        None if exchange >= 0 => winning.push(mv, order | tiebreak),
        None => losing.push(mv, order | tiebreak),
    }
}

fn push_promotions(
    board: &Board,
    from: Square,
    to: Square,
    captured: Option<Piece>,
    winning: &mut MoveList,
    losing: &mut MoveList,
) {
    for promoted in Piece::PROMOTIONS {
        let mv = Move::new(from, to, Piece::Pawn, captured, Some(promoted));
        route_capture(board, mv, winning, losing);
    }
}

/// Captures, en passant and promotions (including quiet ones).
///
/// Moves whose exchange evaluation is non-negative go to `winning`, the
/// rest to `losing`.
pub fn get_captures(board: &Board, winning: &mut MoveList, losing: &mut MoveList) {
    let us = board.side_to_move();
    let them = us.opposite();
    let occ = board.occupied();
    let enemies = board.occupied_by(them) & !board.pieces(them, Piece::King);
    let pawns = board.pieces(us, Piece::Pawn);

    for from in pawns {
        for to in pawn_attacks(from, us) & enemies {
            let captured = board.piece_at(to);
            if seventh_rank(us).contains(from) {
                push_promotions(board, from, to, captured, winning, losing);
            } else {
                let mv = Move::new(from, to, Piece::Pawn, captured, None);
                route_capture(board, mv, winning, losing);
            }
        }
    }

    for from in pawns & seventh_rank(us) {
        let to = from.offset(us.push_offset());
        if !occ.contains(to) {
            push_promotions(board, from, to, None, winning, losing);
        }
    }

    if let Some(ep) = board.en_passant() {
        for from in pawn_attacks(ep, them) & pawns {
            let mv = Move::new(from, ep, Piece::Pawn, Some(Piece::Pawn), None);
            route_capture(board, mv, winning, losing);
        }
    }

    for piece in OFFICERS {
        for from in board.pieces(us, piece) {
            for to in piece_attacks(piece, from, us, occ) & enemies {
                let mv = Move::new(from, to, piece, board.piece_at(to), None);
                route_capture(board, mv, winning, losing);
            }
        }
    }
}

/// Non-promoting pawn pushes, piece moves to empty squares and castling.
pub fn get_non_captures(board: &Board, list: &mut MoveList) {
    let us = board.side_to_move();
    let occ = board.occupied();
    let empty = !occ;
    let pawns = board.pieces(us, Piece::Pawn) & !seventh_rank(us);
    let push = us.push_offset();

    let single = pawns.forward(us) & empty;
    for to in single {
        list.push(Move::new(to.offset(-push), to, Piece::Pawn, None, None), 0);
    }
    for to in single.forward(us) & empty & double_push_rank(us) {
        list.push(
            Move::new(to.offset(-2 * push), to, Piece::Pawn, None, None),
            0,
        );
    }

    for piece in OFFICERS {
        for from in board.pieces(us, piece) {
            for to in piece_attacks(piece, from, us, occ) & empty {
                list.push(Move::new(from, to, piece, None, None), 0);
            }
        }
    }

    let king = board.king_square(us);
    for to in castle_targets(us) {
        if board.can_castle_to(to) {
            list.push(Move::new(king, to, Piece::King, None, None), CASTLE_KEY);
        }
    }
}

fn castle_targets(side: Color) -> [Square; 2] {
    match side {
        Color::White => [Square::G1, Square::C1],
        Color::Black => [Square::G8, Square::C8],
    }
}

/// Moves that may get the side to move out of check.
///
/// With a single checker: captures of the checker, interpositions on the
/// checking ray and king steps. With two checkers only the king may move.
pub fn get_evasions(board: &Board, list: &mut MoveList) {
    let us = board.side_to_move();
    let them = us.opposite();
    let t = tables();
    let occ = board.occupied();
    let king = board.king_square(us);
    let checkers = board.checkers();

    // Squares behind the king on a slider's line stay attacked once the king steps there.
    let mut shadowed = Bitboard::EMPTY;
    for checker in checkers {
        if board.piece_at(checker).is_some_and(Piece::is_slider) {
            shadowed |= t.line(king, checker).without(checker);
        }
    }
    for to in king_attacks(king) & !board.occupied_by(us) & !shadowed {
        let captured = board.piece_at(to);
        let key = mvv_lva(captured, Piece::King) << MVV_LVA_SHIFT;
        list.push(Move::new(king, to, Piece::King, captured, None), key);
    }

    if checkers.has_several() {
        return;
    }
    let Some(checker) = checkers.lsb() else {
        return;
    };
    let blocks = t.between(king, checker);
    let targets = blocks.with(checker);
    let checker_piece = board.piece_at(checker);
    let push = us.push_offset();

    let pawns = board.pieces(us, Piece::Pawn);
    for from in pawn_attacks(checker, them) & pawns {
        add_pawn_move(list, from, checker, checker_piece, us);
    }
    let single = pawns.forward(us) & !occ;
    for to in single & blocks {
        add_pawn_move(list, to.offset(-push), to, None, us);
    }
    for to in single.forward(us) & !occ & double_push_rank(us) & blocks {
        list.push(
            Move::new(to.offset(-2 * push), to, Piece::Pawn, None, None),
            0,
        );
    }
    if let Some(ep) = board.en_passant() {
        let victim = ep.offset(-push);
        if victim == checker || blocks.contains(ep) {
            for from in pawn_attacks(ep, them) & pawns {
                list.push(
                    Move::new(from, ep, Piece::Pawn, Some(Piece::Pawn), None),
                    mvv_lva(Some(Piece::Pawn), Piece::Pawn) << MVV_LVA_SHIFT,
                );
            }
        }
    }

    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
        for from in board.pieces(us, piece) {
            for to in piece_attacks(piece, from, us, occ) & targets {
                let captured = if to == checker { checker_piece } else { None };
                let key = mvv_lva(captured, piece) << MVV_LVA_SHIFT;
                list.push(Move::new(from, to, piece, captured, None), key);
            }
        }
    }
}

/// A pawn move during evasion, expanded into promotions on the last rank.
fn add_pawn_move(list: &mut MoveList, from: Square, to: Square, captured: Option<Piece>, us: Color) {
    let order = mvv_lva(captured, Piece::Pawn) << MVV_LVA_SHIFT;
    if to.rank_index() == us.relative_rank(7) {
        for promoted in Piece::PROMOTIONS {
            let key = if promoted == Piece::Queen {
                PROMOTION_KEY | order
            } else {
                0
            };
            list.push(Move::new(from, to, Piece::Pawn, captured, Some(promoted)), key);
        }
    } else {
        list.push(Move::new(from, to, Piece::Pawn, captured, None), order);
    }
}

/// Quiet moves that give check, for quiescence.
///
/// Direct checks are kept only when they do not lose the moved piece;
/// discovered checks come from pieces standing between the enemy king and
/// one of our sliders.
pub fn get_checks(board: &Board, list: &mut MoveList) {
    let us = board.side_to_move();
    let them = us.opposite();
    let t = tables();
    let occ = board.occupied();
    let empty = !occ;
    let enemy_king = board.king_square(them);
    let last_rank = seventh_rank(us);

    // Discovered checks: a single own piece between the enemy king and our slider.
    let snipers = (rook_attacks(enemy_king, Bitboard::EMPTY)
        & (board.pieces(us, Piece::Rook) | board.pieces(us, Piece::Queen)))
        | (bishop_attacks(enemy_king, Bitboard::EMPTY)
            & (board.pieces(us, Piece::Bishop) | board.pieces(us, Piece::Queen)));
    let mut discoverers = Bitboard::EMPTY;
    for sniper in snipers {
        let blockers = t.between(enemy_king, sniper) & occ;
        if blockers.any() && !blockers.has_several() {
            discoverers |= blockers & board.occupied_by(us);
        }
    }
    for from in discoverers {
        let Some(piece) = board.piece_at(from) else {
            continue;
        };
        let off_line = !t.line(enemy_king, from);
        let targets = match piece {
            Piece::Pawn if last_rank.contains(from) => Bitboard::EMPTY,
            Piece::Pawn => {
                let single = Bitboard::from_square(from).forward(us) & empty;
                let double = single.forward(us) & empty & double_push_rank(us);
                single | double
            }
            Piece::King => king_attacks(from) & empty,
            other => piece_attacks(other, from, us, occ) & empty,
        };
        for to in targets & off_line {
            list.push(Move::new(from, to, piece, None, None), 0);
        }
    }

    // Direct checks.
    let pawn_checks = pawn_attacks(enemy_king, them);
    for from in board.pieces(us, Piece::Pawn) & !last_rank & !discoverers {
        let single = Bitboard::from_square(from).forward(us) & empty;
        let double = single.forward(us) & empty & double_push_rank(us);
        for to in (single | double) & pawn_checks {
            add_quiet_check(board, list, Move::new(from, to, Piece::Pawn, None, None));
        }
    }
    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
        let checking = piece_attacks(piece, enemy_king, them, occ);
        for from in board.pieces(us, piece) & !discoverers {
            for to in piece_attacks(piece, from, us, occ) & empty & checking {
                add_quiet_check(board, list, Move::new(from, to, piece, None, None));
            }
        }
    }
}

fn add_quiet_check(board: &Board, list: &mut MoveList, mv: Move) {
    let exchange = see(board, mv.from(), mv.to(), None);
    if exchange >= 0 {
        list.push(mv, (exchange - SEE_MIN) as u64);
    }
}

/// Whether a pseudo-legal move leaves the mover's king safe.
///
/// `pinned` is the set of the mover's pinned pieces, see [`pinned_pieces`].
pub fn is_legal(board: &Board, mv: Move, pinned: Bitboard) -> bool {
    let us = board.side_to_move();
    let them = us.opposite();
    let (from, to) = (mv.from(), mv.to());
    let king = board.king_square(us);

    if mv.piece() == Piece::King {
        if mv.is_castle() {
            // Transit squares were checked when the move was generated.
            return true;
        }
        let occ = board.occupied().without(from);
        let attackers = crate::exchange::attack_map(board, occ, to) & board.occupied_by(them);
        // A captured piece no longer attacks.
        return attackers.without(to).is_empty();
    }

    if board.is_en_passant(mv) {
        let victim = to.offset(-us.push_offset());
        let occ = board.occupied().without(from).without(victim).with(to);
        let rooks = board.pieces(them, Piece::Rook) | board.pieces(them, Piece::Queen);
        let bishops = board.pieces(them, Piece::Bishop) | board.pieces(them, Piece::Queen);
        return (rook_attacks(king, occ) & rooks).is_empty()
            && (bishop_attacks(king, occ) & bishops).is_empty();
    }

    !pinned.contains(from) || tables().line(king, from).contains(to)
}

/// Every legal move in the position, captures first.
pub fn legal_moves(board: &Board) -> MoveList {
    let mut moves = MoveList::new();
    if board.in_check() {
        get_evasions(board, &mut moves);
    } else {
        let mut losing = MoveList::new();
        get_captures(board, &mut moves, &mut losing);
        for scored in losing.as_slice() {
            moves.push(scored.mv, scored.key);
        }
        get_non_captures(board, &mut moves);
    }
    let pinned = pinned_pieces(board, board.side_to_move());
    moves.retain(|mv| is_legal(board, mv, pinned));
    moves
}

impl Board {
    /// Resolves long algebraic text like `e7e8q` to the matching legal move.
    pub fn find_move(&self, text: &str) -> Option<Move> {
        let wanted = UciMove::parse(text)?;
        legal_moves(self).iter().find(|&mv| wanted.matches(mv))
    }

    /// The position is checkmate or stalemate.
    pub fn has_no_legal_moves(&self) -> bool {
        legal_moves(self).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn board(fen: &str) -> Board {
        Board::from_fen(fen).unwrap()
    }

    fn uci(moves: &MoveList) -> Vec<String> {
        let mut text: Vec<String> = moves.iter().map(|m| m.to_uci()).collect();
        text.sort();
        text
    }

    #[test]
    fn startpos_has_twenty_moves() {
        let b = Board::startpos();
        assert_eq!(legal_moves(&b).len(), 20);
        let mut winning = MoveList::new();
        let mut losing = MoveList::new();
        get_captures(&b, &mut winning, &mut losing);
        assert!(winning.is_empty() && losing.is_empty());
    }

    #[test]
    fn take_best_orders_by_key() {
        let mut list = MoveList::new();
        let a = Move::new(Square::A1, Square::A8, Piece::Rook, None, None);
        let b = Move::new(Square::H1, Square::H8, Piece::Rook, None, None);
        let c = Move::new(Square::E1, Square::E8, Piece::Rook, None, None);
        list.push(a, 5);
        list.push(b, 9);
        list.push(c, 5);
        assert_eq!(list.take_best().map(|s| s.mv), Some(b));
        assert_eq!(list.take_best().map(|s| s.mv), Some(a));
        assert_eq!(list.take_best().map(|s| s.mv), Some(c));
        assert_eq!(list.take_best(), None);
    }

    #[test]
    fn captures_are_split_by_exchange() {
        // Qxd5 loses the queen to the c6 pawn; exd5 wins a pawn.
        let b = board("4k3/8/2p5/3p4/4P3/8/3Q4/4K3 w - - 0 1");
        let mut winning = MoveList::new();
        let mut losing = MoveList::new();
        get_captures(&b, &mut winning, &mut losing);
        assert_eq!(uci(&winning), vec!["e4d5"]);
        assert_eq!(uci(&losing), vec!["d2d5"]);
    }

    #[test]
    fn promotions_are_routed() {
        let b = board("4k3/1P6/8/8/8/8/8/4K3 w - - 0 1");
        let mut winning = MoveList::new();
        let mut losing = MoveList::new();
        get_captures(&b, &mut winning, &mut losing);
        assert_eq!(uci(&winning), vec!["b7b8q"]);
        assert_eq!(uci(&losing), vec!["b7b8b", "b7b8n", "b7b8r"]);
        assert!(winning.as_slice()[0].key & PROMOTION_KEY != 0);
    }

    #[test]
    fn castling_is_generated_and_flagged() {
        let b = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let mut quiet = MoveList::new();
        get_non_captures(&b, &mut quiet);
        let castles: Vec<ScoredMove> = quiet
            .as_slice()
            .iter()
            .copied()
            .filter(|s| s.mv.is_castle())
            .collect();
        assert_eq!(castles.len(), 2);
        assert!(castles.iter().all(|s| s.key == CASTLE_KEY));
    }

    #[test]
    fn no_castling_through_attack() {
        let b = board("r3k2r/pppp1ppp/8/4r3/8/8/PPPP1PPP/R3K2R w KQkq - 0 1");
        // The e-file rook checks the king, so evasions are generated instead.
        assert!(b.in_check());
        assert!(!legal_moves(&b).iter().any(|m| m.is_castle()));

        let b = board("r3k2r/8/8/8/8/5r2/8/R3K2R w KQkq - 0 1");
        let moves = legal_moves(&b);
        assert!(!moves.iter().any(|m| m.to() == Square::G1 && m.is_castle()));
        assert!(moves.iter().any(|m| m.to() == Square::C1 && m.is_castle()));
    }

    #[test]
    fn en_passant_capture_is_generated() {
        let b = board("rnbqkbnr/pppp1ppp/8/4pP2/8/8/PPPPP1PP/RNBQKBNR w KQkq e6 0 3");
        let ep = b.find_move("f5e6").unwrap();
        assert!(b.is_en_passant(ep));
        assert_eq!(ep.captured(), Some(Piece::Pawn));
    }

    #[test]
    fn en_passant_discovered_check_is_illegal() {
        // Taking on c6 would expose the king on a5 to the h5 rook.
        let b = board("8/8/8/KPp4r/8/8/8/4k3 w - c6 0 2");
        assert!(b.find_move("b5c6").is_none());
        assert!(b.find_move("b5b6").is_some());
    }

    #[test]
    fn evasions_only_when_in_check() {
        let b = board("4k3/8/8/8/8/8/3P4/r3K2N w - - 0 1");
        let moves = legal_moves(&b);
        assert_eq!(uci(&moves), vec!["e1e2", "e1f2"]);

        // Double check: king moves only.
        let b = board("4k3/8/8/8/1b6/8/2N5/r3K3 w - - 0 1");
        let moves = legal_moves(&b);
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|m| m.piece() == Piece::King));
    }

    #[test]
    fn blocking_and_capturing_the_checker() {
        let b = board("4k3/8/8/8/8/8/1R6/r3K3 w - - 0 1");
        let moves = uci(&legal_moves(&b));
        assert!(moves.contains(&"b2b1".to_string()));
        assert!(moves.contains(&"e1e2".to_string()));
        let b = board("4k3/8/8/8/8/8/R7/r3K3 w - - 0 1");
        assert!(uci(&legal_moves(&b)).contains(&"a2a1".to_string()));
    }

    #[test]
    fn checking_moves() {
        let b = board("4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        let mut checks = MoveList::new();
        get_checks(&b, &mut checks);
        let text = uci(&checks);
        assert!(text.contains(&"a1a8".to_string()));
        for mv in checks.iter() {
            let mut after = b.clone();
            after.make(mv);
            assert!(after.in_check(), "{mv} does not check");
        }
    }

    #[test]
    fn discovered_checks() {
        // The bishop on e2 blocks the rook; any bishop move off the file checks.
        let b = board("4k3/8/8/8/8/8/4B3/4RK2 w - - 0 1");
        let mut checks = MoveList::new();
        get_checks(&b, &mut checks);
        assert!(checks.iter().any(|m| m.piece() == Piece::Bishop));
        for mv in checks.iter() {
            let mut after = b.clone();
            after.make(mv);
            assert!(after.in_check(), "{mv} does not check");
        }
    }

    #[test]
    fn find_move_resolves_text() {
        let b = Board::startpos();
        let mv = b.find_move("g1f3").unwrap();
        assert_eq!(mv.piece(), Piece::Knight);
        assert!(b.find_move("e2e5").is_none());
        assert!(b.find_move("nonsense").is_none());
    }

    #[test]
    fn terminal_positions() {
        let mate = board("R5k1/5ppp/8/8/8/8/5PPP/6K1 b - - 0 1");
        assert!(mate.in_check() && mate.has_no_legal_moves());
        let stalemate = board("7k/5Q2/8/8/8/8/8/6K1 b - - 0 1");
        assert!(!stalemate.in_check() && stalemate.has_no_legal_moves());
    }

    proptest! {
        #[test]
        fn generated_moves_describe_the_board(path in proptest::collection::vec(0usize..256, 0..12)) {
            let mut b = board("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
            for choice in path {
                let moves = legal_moves(&b);
                if moves.is_empty() {
                    break;
                }
                for mv in moves.iter() {
                    prop_assert_eq!(b.piece_at(mv.from()), Some(mv.piece()));
                    prop_assert_eq!(b.color_at(mv.from()), Some(b.side_to_move()));
                    prop_assert!(b.is_pseudo_legal(mv), "{} not pseudo-legal", mv);
                    if let Some(victim) = mv.captured() {
                        if !b.is_en_passant(mv) {
                            prop_assert_eq!(b.piece_at(mv.to()), Some(victim));
                            prop_assert_eq!(b.color_at(mv.to()), Some(b.side_to_move().opposite()));
                        }
                    }
                }
                let mv = moves.as_slice()[choice % moves.len()].mv;
                let before = b.clone();
                let memento = b.make(mv);
                prop_assert!(b.validate().is_ok());
                prop_assert!(!b.is_attacked(b.king_square(before.side_to_move()), b.side_to_move()));
                b.unmake(mv, memento);
                prop_assert_eq!(&b, &before);
                b.make(mv);
            }
        }
    }
}
