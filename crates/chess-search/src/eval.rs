//! Static evaluation.
//!
//! Scores are computed from white's point of view as separate middlegame and
//! endgame sums, blended by how much non-pawn material remains, and returned
//! from the side to move's point of view.

use crate::pawns::{pst_index, PawnCache, PawnEntry};
use chess_core::{Color, Piece, Square};
use chess_engine::{
    bishop_attacks, knight_attacks, queen_attacks, rook_attacks, tables, Board, MAX_PHASE,
};

/// Margin for the material-only early exit.
pub const LAZY_MARGIN: i32 = Piece::Bishop.value();
/// Bonus for having the move.
pub const TEMPO: i32 = 10;

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const QUEEN_PST: [i32; 64] = [
    -20, -10, -10, -5, -5, -10, -10, -20,
    -10,   0,   0,  0,  0,   0,   0, -10,
    -10,   0,   5,  5,  5,   5,   0, -10,
     -5,   0,   5,  5,  5,   5,   0,  -5,
      0,   0,   5,  5,  5,   5,   0,  -5,
    -10,   5,   5,  5,  5,   5,   0, -10,
    -10,   0,   5,  0,  0,   0,   0, -10,
    -20, -10, -10, -5, -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_MG_PST: [i32; 64] = [
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -10, -20, -20, -20, -20, -20, -20, -10,
     20,  20,   0,   0,   0,   0,  20,  20,
     20,  30,  10,   0,   0,  10,  30,  20,
];

#[rustfmt::skip]
const KING_EG_PST: [i32; 64] = [
    -50, -40, -30, -20, -20, -30, -40, -50,
    -30, -20, -10,   0,   0, -10, -20, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -30,   0,   0,   0,   0, -30, -30,
    -50, -30, -30, -30, -30, -30, -30, -50,
];

/// `weight * (moves - pivot)`, so a piece with fewer than `pivot` safe moves is penalised.
const fn mobility_table(pivot: i32, weight: i32) -> [i32; 28] {
    let mut table = [0; 28];
    let mut i = 0;
    while i < 28 {
        table[i] = weight * (i as i32 - pivot);
        i += 1;
    }
    table
}

const KNIGHT_MOBILITY: [i32; 28] = mobility_table(4, 4);
const BISHOP_MOBILITY: [i32; 28] = mobility_table(6, 4);
const ROOK_MOBILITY: [i32; 28] = mobility_table(7, 2);
const QUEEN_MOBILITY: [i32; 28] = mobility_table(13, 1);

/// Grows quadratically with the pressure on the king, then levels off.
const fn king_threat_table() -> [i32; 64] {
    let mut table = [0; 64];
    let mut i = 0;
    while i < 64 {
        let n = i as i32;
        let value = n * n * 3 / 2;
        table[i] = if value > 500 { 500 } else { value };
        i += 1;
    }
    table
}

const KING_THREAT: [i32; 64] = king_threat_table();

/// Weight of one attacked king-zone square, by attacker.
const fn zone_weight(piece: Piece) -> u32 {
    match piece {
        Piece::Knight | Piece::Bishop => 2,
        Piece::Rook => 3,
        Piece::Queen => 5,
        Piece::Pawn | Piece::King => 0,
    }
}

const KNIGHT_PAWN_BONUS: i32 = 6;
const ROOK_PAWN_PENALTY: i32 = 12;
const BISHOP_PAIR: i32 = 30;
const BISHOP_PAIR_PER_PAWN: i32 = 3;
const QUEEN_TROPISM: i32 = 2;
const KING_SHIELD: i32 = 8;
const ROOK_BEHIND_PASSER: i32 = 20;
const UNSTOPPABLE_PAWN: i32 = 500;

#[derive(Default)]
struct Score {
    mg: i32,
    eg: i32,
}

impl Score {
    #[inline]
    fn add(&mut self, mg: i32, eg: i32) {
        self.mg += mg;
        self.eg += eg;
    }
}

/// Evaluates `board` for the side to move.
///
/// When material alone is already far outside `[alpha, beta]` the material
/// balance is returned without looking further.
pub fn evaluate(board: &Board, pawns: &mut PawnCache, alpha: i32, beta: i32) -> i32 {
    let us = board.side_to_move();
    let them = us.opposite();
    let material = board.material(us) - board.material(them);
    if material < alpha - LAZY_MARGIN || material > beta + LAZY_MARGIN {
        return material;
    }

    let entry = *pawns.probe(board);
    let white = side_score(board, &entry, Color::White);
    let black = side_score(board, &entry, Color::Black);
    let mg = white.mg - black.mg + entry.mg[0] - entry.mg[1];
    let eg = white.eg - black.eg + entry.eg[0] - entry.eg[1];

    let counter = board.endgame_counter().min(MAX_PHASE) as i32;
    let phase = ((MAX_PHASE as i32 - counter) * 256 + MAX_PHASE as i32 / 2) / MAX_PHASE as i32;
    let positional = (mg * (256 - phase) + eg * phase) / 256;

    let relative = match us {
        Color::White => positional,
        Color::Black => -positional,
    };
    material + relative + TEMPO
}

/// Everything except pawn structure and material for one side.
fn side_score(board: &Board, entry: &PawnEntry, side: Color) -> Score {
    let t = tables();
    let them = side.opposite();
    let occ = board.occupied();
    let own = board.occupied_by(side);
    let safe = !own & !entry.attacks[them.index()];
    let enemy_king = board.king_square(them);
    let zone = t.king_zone(them, enemy_king);
    let own_pawns = entry.count[side.index()] as i32;
    let enemy_pawns = entry.count[them.index()] as i32;

    let mut score = Score::default();
    let mut threat = 0u32;

    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
        for sq in board.pieces(side, piece) {
            let idx = pst_index(side, sq);
            let attacks = match piece {
                Piece::Knight => knight_attacks(sq),
                Piece::Bishop => bishop_attacks(sq, occ),
                Piece::Rook => rook_attacks(sq, occ),
                _ => queen_attacks(sq, occ),
            };
            let moves = (attacks & safe).count() as usize;
            threat += (attacks & zone).count() * zone_weight(piece);

            match piece {
                Piece::Knight => {
                    score.add(KNIGHT_PST[idx], KNIGHT_PST[idx]);
                    let mob = KNIGHT_MOBILITY[moves];
                    let pawns = KNIGHT_PAWN_BONUS * (own_pawns - 5);
                    score.add(mob + pawns, mob + pawns);
                }
                Piece::Bishop => {
                    score.add(BISHOP_PST[idx], BISHOP_PST[idx]);
                    let mob = BISHOP_MOBILITY[moves];
                    score.add(mob, mob);
                }
                Piece::Rook => {
                    score.add(ROOK_PST[idx], 0);
                    let mob = ROOK_MOBILITY[moves];
                    let pawns = -ROOK_PAWN_PENALTY * (own_pawns - 5);
                    score.add(mob + pawns, mob + pawns);
                }
                _ => {
                    score.add(QUEEN_PST[idx], QUEEN_PST[idx]);
                    let mob = QUEEN_MOBILITY[moves];
                    let tropism = QUEEN_TROPISM * (7 - sq.distance(enemy_king) as i32);
                    score.add(mob + tropism, mob);
                }
            }
        }
    }

    if board.pieces(side, Piece::Bishop).has_several() {
        let pair = BISHOP_PAIR + BISHOP_PAIR_PER_PAWN * (8 - enemy_pawns);
        score.add(pair, pair);
    }

    let king = board.king_square(side);
    let idx = pst_index(side, king);
    let shield = (t.king_shield(side, king) & board.pieces(side, Piece::Pawn)).count() as i32;
    score.add(KING_MG_PST[idx] + KING_SHIELD * shield, KING_EG_PST[idx]);

    score.add(king_threat(board, side, threat), 0);

    passed_pawns(board, entry, side, &mut score);
    score
}

/// Mid-game bonus for `threat` weighted attacks into the enemy king zone.
/// A missing pawn in front of the enemy king raises the base.
fn king_threat(board: &Board, side: Color, threat: u32) -> i32 {
    let them = side.opposite();
    let enemy_king = board.king_square(them);
    let shield = (tables().king_shield(them, enemy_king) & board.pieces(them, Piece::Pawn)).count();
    let base = 3u32.saturating_sub(shield);
    KING_THREAT[(threat + base).min(63) as usize]
}

/// Endgame terms for passed pawns: rooks behind them, and pawns the enemy
/// king can no longer catch once the enemy has only pawns left.
fn passed_pawns(board: &Board, entry: &PawnEntry, side: Color, score: &mut Score) {
    let t = tables();
    let them = side.opposite();
    let rooks = board.pieces(side, Piece::Rook);
    let race = !board.has_non_pawn_material(them);
    let enemy_king = board.king_square(them);

    for sq in entry.passed[side.index()] {
        if (t.front_span(them, sq) & rooks).any() {
            score.add(0, ROOK_BEHIND_PASSER);
        }
        if race && unstoppable(board, side, sq, enemy_king) {
            score.add(0, UNSTOPPABLE_PAWN);
        }
    }
}

/// Rule of the square, with the first step counting double from the home rank.
fn unstoppable(board: &Board, side: Color, pawn: Square, enemy_king: Square) -> bool {
    let t = tables();
    if (t.front_span(side, pawn) & board.occupied()).any() {
        return false;
    }
    let rank = side.relative_rank(pawn.rank_index()) as i32;
    let promotion = Square::from_coords(pawn.file_index() as i8, side.relative_rank(7) as i8);
    let Some(promotion) = promotion else {
        return false;
    };
    let mut pawn_moves = 7 - rank;
    if rank == 1 {
        pawn_moves -= 1;
    }
    let mut king_moves = enemy_king.distance(promotion) as i32;
    if board.side_to_move() == side.opposite() {
        king_moves -= 1;
    }
    pawn_moves < king_moves
}
