//! Static evaluation: network output blended with material, optimism
//! and the 50-move counter, clamped away from the tablebase range.

pub mod nnue;

use cozy_chess::{Color, Piece};

use crate::board::{Position, PAWN_VALUE};
use nnue::{AccumulatorCaches, AccumulatorStack, Networks};

pub type Value = i32;

pub const VALUE_ZERO: Value = 0;
pub const VALUE_MATE: Value = 32000;
pub const MAX_PLY: usize = 246;
pub const VALUE_MATE_IN_MAX_PLY: Value = VALUE_MATE - MAX_PLY as Value;
pub const VALUE_TB: Value = VALUE_MATE_IN_MAX_PLY - 1;
pub const VALUE_TB_WIN_IN_MAX_PLY: Value = VALUE_TB - MAX_PLY as Value;
pub const VALUE_TB_LOSS_IN_MAX_PLY: Value = -VALUE_TB_WIN_IN_MAX_PLY;

/// Alpha-beta node kind, as far as evaluation cares: PV nodes always get
/// the big network.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeType {
    Pv,
    NonPv,
}

/// Purely materialistic evaluation from `c`'s point of view. Divided by
/// `PAWN_VALUE` it approximates the material advantage in pawns.
pub fn simple_eval(pos: &Position, c: Color) -> Value {
    PAWN_VALUE * (pos.count(c, Piece::Pawn) - pos.count(!c, Piece::Pawn))
        + (pos.non_pawn_material(c) - pos.non_pawn_material(!c))
}

/// The small network is good enough when material is lopsided.
pub fn use_smallnet(pos: &Position) -> bool {
    simple_eval(pos, pos.side_to_move()).abs() > 962
}

/// Stricter gate used on the quiescence path, where the re-evaluation
/// safety net is not worth its cost.
pub fn use_smallnet_at_quiescence(pos: &Position) -> bool {
    simple_eval(pos, pos.side_to_move()).abs() > 1018 + 5 * pos.count_all(Piece::Pawn)
}

/// Static evaluation from the side to move's point of view. Pure in
/// `(pos, optimism, network parameters)`; never returns a value inside
/// the tablebase range.
pub fn evaluate(
    networks: &Networks,
    pos: &Position,
    stack: &mut AccumulatorStack,
    caches: &mut AccumulatorCaches,
    optimism: Value,
    node: NodeType,
) -> Value {
    debug_assert!(!pos.in_check());

    let simple = simple_eval(pos, pos.side_to_move());
    let mut small = node == NodeType::NonPv && use_smallnet(pos);

    let (mut psqt, mut positional) = if small {
        networks.small.evaluate(pos, stack, &mut caches.small)
    } else {
        networks.big.evaluate(pos, stack, &mut caches.big)
    };
    let mut nnue = (125 * psqt + 131 * positional) / 128;

    // Re-evaluate with the big net when the small one is not confident.
    if small && (nnue.abs() < 236 || nnue * simple < 0) {
        let (p, q) = networks.big.evaluate(pos, stack, &mut caches.big);
        psqt = p;
        positional = q;
        nnue = (125 * psqt + 131 * positional) / 128;
        small = false;
    }

    let complexity = (psqt - positional).abs();
    let mut optimism = optimism;
    optimism += optimism * complexity / 468;
    nnue -= nnue * complexity / if small { 20233 } else { 17879 };

    let pawn_weight = if small { 553 } else { 532 };
    let material = pawn_weight * pos.count_all(Piece::Pawn) + pos.non_pawn_material_total();
    let mut v = (nnue * (77777 + material) + optimism * (7777 + material)) / 77777;

    // Damp down the evaluation linearly when shuffling.
    v = v * (208 - pos.rule50_count()) / 212;

    v.clamp(VALUE_TB_LOSS_IN_MAX_PLY + 1, VALUE_TB_WIN_IN_MAX_PLY - 1)
}

/// Human-readable evaluation breakdown, from White's point of view.
pub fn trace(networks: &Networks, pos: &Position) -> String {
    use std::fmt::Write;

    if pos.in_check() {
        return "Final evaluation: none (in check)".to_string();
    }

    let mut stack = AccumulatorStack::new();
    let mut caches = AccumulatorCaches::new(networks);
    let sign = if pos.side_to_move() == Color::White { 1 } else { -1 };

    let mut out = String::new();
    let (psqt, positional) = networks.big.evaluate(pos, &mut stack, &mut caches.big);
    let _ = writeln!(out, "psqt        {:>8} cp", sign * psqt);
    let _ = writeln!(out, "positional  {:>8} cp", sign * positional);
    let _ = writeln!(
        out,
        "small net   {}",
        if use_smallnet(pos) { "yes" } else { "no" }
    );
    let _ = writeln!(
        out,
        "small net (quiescence gate) {}",
        if use_smallnet_at_quiescence(pos) { "yes" } else { "no" }
    );
    let v = evaluate(networks, pos, &mut stack, &mut caches, VALUE_ZERO, NodeType::Pv);
    let _ = writeln!(out, "final       {:>8} cp (white side)", sign * v);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_eval_is_antisymmetric() {
        let pos = Position::from_fen(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPP1PPP/RNBQKBNR w KQkq - 0 1",
        )
        .unwrap();
        assert_eq!(
            simple_eval(&pos, Color::White),
            -simple_eval(&pos, Color::Black)
        );
        assert_eq!(simple_eval(&pos, Color::White), -PAWN_VALUE);
    }

    #[test]
    fn tb_bounds_bracket_zero() {
        assert!(VALUE_TB_LOSS_IN_MAX_PLY < 0);
        assert!(VALUE_TB_WIN_IN_MAX_PLY > 0);
        assert_eq!(VALUE_TB_WIN_IN_MAX_PLY, 31507);
    }
}
