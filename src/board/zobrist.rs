//! Zobrist key over pawn placement, feeding the pawn-structure history.

use cozy_chess::{Board, Color, Piece};
use std::sync::OnceLock;

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

static TABLE: OnceLock<[u64; 2 * 64]> = OnceLock::new();

fn table() -> &'static [u64; 2 * 64] {
    TABLE.get_or_init(|| {
        let mut t = [0u64; 2 * 64];
        let mut seed = 0x5073_7461_6E63_6533;
        for v in &mut t {
            seed = splitmix64(seed);
            *v = seed;
        }
        t
    })
}

pub fn pawn_key(board: &Board) -> u64 {
    let t = table();
    let mut key = 0u64;
    for color in [Color::White, Color::Black] {
        let pawns = board.colors(color) & board.pieces(Piece::Pawn);
        for sq in pawns {
            key ^= t[color as usize * 64 + sq as usize];
        }
    }
    key
}
