//! Static Exchange Evaluation as a threshold test.
//!
//! Swap-off on the destination square, revealing x-ray attackers as
//! blockers are consumed. King "captures" end the sequence: the king may
//! only take when the opponent has no attacker left.

use cozy_chess::{get_bishop_moves, get_rook_moves, Move, Piece};

use super::{piece_value, Position};
use crate::eval::Value;

pub(super) fn see_ge(pos: &Position, mv: Move, threshold: Value) -> bool {
    // Castling exchanges nothing; en passant victims are ignored the same
    // way an empty destination is, which keeps the test conservative.
    if pos.is_castling(mv) {
        return 0 >= threshold;
    }

    let board = pos.board();

    let mut swap = mv_victim_value(pos, mv) - threshold;
    if swap < 0 {
        return false;
    }

    let attacker = match board.piece_on(mv.from) {
        Some(p) => p,
        None => return false,
    };
    swap = piece_value(attacker) - swap;
    if swap <= 0 {
        return true;
    }

    let mut occupied = board.occupied() ^ mv.from.bitboard() ^ mv.to.bitboard();
    let mut stm = pos.side_to_move();
    let mut attackers = pos.attackers_to(mv.to, occupied);
    let bishops_queens = board.pieces(Piece::Bishop) | board.pieces(Piece::Queen);
    let rooks_queens = board.pieces(Piece::Rook) | board.pieces(Piece::Queen);

    let mut res = true;
    loop {
        stm = !stm;
        attackers &= occupied;

        let stm_attackers = attackers & board.colors(stm);
        if stm_attackers.is_empty() {
            break;
        }
        res = !res;

        // Pick the least valuable attacker, reveal x-rays behind it.
        let mut next_attacker = None;
        for piece in [
            Piece::Pawn,
            Piece::Knight,
            Piece::Bishop,
            Piece::Rook,
            Piece::Queen,
            Piece::King,
        ] {
            let candidates = stm_attackers & board.pieces(piece);
            if let Some(sq) = candidates.into_iter().next() {
                next_attacker = Some((piece, sq));
                break;
            }
        }
        let (piece, sq) = next_attacker.expect("non-empty attacker set");

        if piece == Piece::King {
            // The king can only recapture if the opponent has run out of
            // attackers; either way the sequence ends here.
            if !(attackers & board.colors(!stm)).is_empty() {
                res = !res;
            }
            return res;
        }

        swap = piece_value(piece) - swap;
        if swap < i32::from(res) {
            break;
        }

        occupied ^= sq.bitboard();
        match piece {
            Piece::Pawn | Piece::Bishop => {
                attackers |= get_bishop_moves(mv.to, occupied) & bishops_queens;
            }
            Piece::Rook => {
                attackers |= get_rook_moves(mv.to, occupied) & rooks_queens;
            }
            Piece::Queen => {
                attackers |= (get_bishop_moves(mv.to, occupied) & bishops_queens)
                    | (get_rook_moves(mv.to, occupied) & rooks_queens);
            }
            _ => {}
        }
    }
    res
}

fn mv_victim_value(pos: &Position, mv: Move) -> Value {
    match pos.board().piece_on(mv.to) {
        Some(p) => piece_value(p),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn mv(uci: &str) -> Move {
        Move::from_str(uci).unwrap()
    }

    #[test]
    fn rook_takes_defended_pawn_loses_the_exchange() {
        // After Rxh7, Kxh7 wins the rook.
        let pos =
            Position::from_fen("6k1/2R4p/6p1/8/6K1/6P1/8/8 w - - 3 38").unwrap();
        let m = mv("c7h7");
        assert!(pos.see_ge(m, -(super::super::ROOK_VALUE - super::super::PAWN_VALUE)));
        assert!(!pos.see_ge(m, 0), "Rxh7 must not pass SEE >= 0");
    }

    #[test]
    fn pawn_takes_pawn_undefended_wins_a_pawn() {
        let pos = Position::from_fen(
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
        )
        .unwrap();
        let m = mv("e4d5");
        assert!(pos.see_ge(m, 0));
        // d5 is defended by the queen: winning a full pawn is not on offer.
        assert!(!pos.see_ge(m, super::super::PAWN_VALUE));
    }

    #[test]
    fn queen_takes_defended_pawn_fails_threshold_zero() {
        let pos = Position::from_fen(
            "rnbqkbnr/ppp1pppp/8/3p4/8/4Q3/PPPPPPPP/RNB1KBNR w KQkq - 0 2",
        )
        .unwrap();
        // Qxd5?? drops the queen for two pawns at best.
        assert!(!pos.see_ge(mv("e3d5"), 0));
    }

    #[test]
    fn xray_recapture_is_seen() {
        // Doubled rooks vs a pawn defended by a rook: Rxd5 holds because
        // the second rook recaptures from behind the first.
        let pos =
            Position::from_fen("3r2k1/8/8/3p4/8/8/3R4/3R2K1 w - - 0 1").unwrap();
        assert!(pos.see_ge(mv("d2d5"), 0));
    }

    #[test]
    fn quiet_move_to_guarded_square_fails() {
        // Rb5 walks into the c6 pawn.
        let pos = Position::from_fen("6k1/8/2p5/8/8/8/1R6/6K1 w - - 0 1").unwrap();
        assert!(!pos.see_ge(mv("b2b5"), 0));
        // The same rook lift to a safe square passes.
        assert!(pos.see_ge(mv("b2b4"), 0));
    }
}
