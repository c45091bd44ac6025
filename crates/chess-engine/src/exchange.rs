//! Attackers of a square, pins and static exchange evaluation.

use crate::movegen::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks};
use crate::tables::tables;
use crate::{Bitboard, Board};
use chess_core::{Color, Piece, Square};

/// Worst possible exchange result: a queen lost for a pawn.
pub const SEE_MIN: i32 = -780;
/// Best possible exchange result: an undefended queen.
pub const SEE_MAX: i32 = 880;

/// Every piece of either side attacking `sq`, given the occupancy `occ`.
///
/// Pieces missing from `occ` neither attack nor block, which is how exchange
/// evaluation uncovers x-ray attackers.
pub fn attack_map(board: &Board, occ: Bitboard, sq: Square) -> Bitboard {
    let w = Color::White;
    let b = Color::Black;
    let straight = board.pieces(w, Piece::Rook)
        | board.pieces(b, Piece::Rook)
        | board.pieces(w, Piece::Queen)
        | board.pieces(b, Piece::Queen);
    let diagonal = board.pieces(w, Piece::Bishop)
        | board.pieces(b, Piece::Bishop)
        | board.pieces(w, Piece::Queen)
        | board.pieces(b, Piece::Queen);
    let attackers = (pawn_attacks(sq, b) & board.pieces(w, Piece::Pawn))
        | (pawn_attacks(sq, w) & board.pieces(b, Piece::Pawn))
        | (knight_attacks(sq) & (board.pieces(w, Piece::Knight) | board.pieces(b, Piece::Knight)))
        | (king_attacks(sq) & (board.pieces(w, Piece::King) | board.pieces(b, Piece::King)))
        | (rook_attacks(sq, occ) & straight)
        | (bishop_attacks(sq, occ) & diagonal);
    attackers & occ
}

/// Squares the `own` piece on `sq` may move to without exposing its king.
///
/// Returns the whole board when the piece is not pinned, otherwise the
/// squares between the king and the pinning slider plus the slider itself.
pub fn is_pinned(board: &Board, sq: Square, own: Color, enemy: Color) -> Bitboard {
    let t = tables();
    let king = board.king_square(own);
    let Some(dir) = t.direction(king, sq) else {
        return Bitboard::FULL;
    };
    let occ = board.occupied();
    if (t.between(king, sq) & occ).any() {
        return Bitboard::FULL;
    }
    let beyond = t.ray(dir, sq) & occ;
    let blocker = if dir.is_increasing() {
        beyond.lsb()
    } else {
        beyond.msb()
    };
    let Some(pinner) = blocker else {
        return Bitboard::FULL;
    };
    let sliders = if dir.is_diagonal() {
        board.pieces(enemy, Piece::Bishop) | board.pieces(enemy, Piece::Queen)
    } else {
        board.pieces(enemy, Piece::Rook) | board.pieces(enemy, Piece::Queen)
    };
    if sliders.contains(pinner) {
        t.between(king, pinner).with(pinner)
    } else {
        Bitboard::FULL
    }
}

/// All pieces of `side` pinned against their own king.
pub fn pinned_pieces(board: &Board, side: Color) -> Bitboard {
    let t = tables();
    let enemy = side.opposite();
    let king = board.king_square(side);
    let occ = board.occupied();
    let snipers = (rook_attacks(king, Bitboard::EMPTY)
        & (board.pieces(enemy, Piece::Rook) | board.pieces(enemy, Piece::Queen)))
        | (bishop_attacks(king, Bitboard::EMPTY)
            & (board.pieces(enemy, Piece::Bishop) | board.pieces(enemy, Piece::Queen)));

    let mut pinned = Bitboard::EMPTY;
    for sniper in snipers {
        let blockers = t.between(king, sniper) & occ;
        if blockers.any() && !blockers.has_several() {
            pinned |= blockers & board.occupied_by(side);
        }
    }
    pinned
}

/// Static exchange evaluation of the piece on `from` moving to `to` and
/// capturing `victim` (if any).
///
/// Both sides keep recapturing on `to` with their least valuable attacker,
/// and either may stop when continuing would lose material. The result is
/// the material balance for the side making the first capture, clamped to
/// `[SEE_MIN, SEE_MAX]`.
pub fn see(board: &Board, from: Square, to: Square, victim: Option<Piece>) -> i32 {
    let (Some(mover), Some(us)) = (board.piece_at(from), board.color_at(from)) else {
        tracing::debug!(%from, %to, "exchange from an empty square");
        return SEE_MIN;
    };
    if victim == Some(Piece::King) {
        tracing::debug!(%from, %to, "exchange captures a king");
        return SEE_MIN;
    }

    let mut occ = board.occupied().without(from);
    if mover == Piece::Pawn && victim == Some(Piece::Pawn) && board.en_passant() == Some(to) {
        occ = occ.without(to.offset(-us.push_offset()));
    }
    let mut attackers = attack_map(board, occ, to);
    let victim_value = victim.map_or(0, Piece::value);

    if mover == Piece::King {
        return if (attackers & board.occupied_by(us.opposite())).any() {
            SEE_MIN
        } else {
            victim_value.min(SEE_MAX)
        };
    }

    let mut gains = [0i32; 32];
    gains[0] = victim_value;
    let mut depth = 1;
    let mut standing = mover.exchange_value();
    let mut side = us.opposite();

    while depth < gains.len() {
        let ours = attackers & board.occupied_by(side);
        let Some((piece, sq)) = least_valuable(board, ours, side) else {
            break;
        };
        // The king only recaptures when nothing can take it back.
        if piece == Piece::King && (attackers & board.occupied_by(side.opposite())).any() {
            break;
        }

        gains[depth] = standing - gains[depth - 1];
        standing = piece.exchange_value();
        occ = occ.without(sq);
        attackers = attackers.without(sq);
        if matches!(piece, Piece::Pawn | Piece::Bishop | Piece::Rook | Piece::Queen) {
            // Sliders lined up behind the piece that just moved join in.
            attackers |= attack_map(board, occ, to);
        }
        side = side.opposite();
        depth += 1;
    }

    while depth > 1 {
        depth -= 1;
        gains[depth - 1] = -(-gains[depth - 1]).max(gains[depth]);
    }
    gains[0].clamp(SEE_MIN, SEE_MAX)
}

fn least_valuable(board: &Board, set: Bitboard, side: Color) -> Option<(Piece, Square)> {
    Piece::ALL.into_iter().find_map(|piece| {
        (set & board.pieces(side, piece))
            .lsb()
            .map(|sq| (piece, sq))
    })
}
