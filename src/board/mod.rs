//! Position adapter over cozy-chess.
//!
//! The evaluation and move-ordering core consumes the board through this
//! surface only: bitboard accessors, attack unions, SEE, the dirty-piece
//! record produced by `play`, and the pawn-structure key. Move generation
//! and legality stay inside cozy-chess.

mod see;
mod zobrist;

use cozy_chess::{
    get_bishop_moves, get_king_moves, get_knight_moves, get_pawn_attacks, get_rook_moves,
    BitBoard, Board, Color, File, Move, Piece, Rank, Square,
};

use crate::eval::Value;

/// Piece values on the Stockfish centipawn scale, used by SEE, move
/// scoring and the material term of the evaluation blend.
pub const PAWN_VALUE: Value = 208;
pub const KNIGHT_VALUE: Value = 781;
pub const BISHOP_VALUE: Value = 825;
pub const ROOK_VALUE: Value = 1276;
pub const QUEEN_VALUE: Value = 2538;

pub const fn piece_value(piece: Piece) -> Value {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => 0,
    }
}

/// A piece together with its color.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ColoredPiece {
    pub color: Color,
    pub piece: Piece,
}

impl ColoredPiece {
    pub const fn new(color: Color, piece: Piece) -> Self {
        Self { color, piece }
    }

    /// Dense 0..12 index (color-major) for the history tables.
    pub const fn index(self) -> usize {
        self.color as usize * 6 + self.piece as usize
    }
}

/// One changed placement: `from == None` means the piece appeared
/// (promotion), `to == None` means it left the board (capture victim,
/// promoted-away pawn).
#[derive(Clone, Copy, Debug)]
pub struct DirtyEntry {
    pub pc: ColoredPiece,
    pub from: Option<Square>,
    pub to: Option<Square>,
}

/// The placements changed by a single move. A quiet move produces one
/// entry, captures and castling two, a capture-promotion three. A null
/// move produces none.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirtyPiece {
    entries: [Option<DirtyEntry>; 3],
    len: usize,
}

impl DirtyPiece {
    pub const EMPTY: DirtyPiece = DirtyPiece { entries: [None; 3], len: 0 };

    fn push(&mut self, pc: ColoredPiece, from: Option<Square>, to: Option<Square>) {
        debug_assert!(self.len < 3, "more than three dirty placements");
        self.entries[self.len] = Some(DirtyEntry { pc, from, to });
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirtyEntry> {
        self.entries[..self.len].iter().flatten()
    }

    /// The king move of `color`, if this record contains one.
    pub fn king_move(&self, color: Color) -> Option<(Square, Square)> {
        self.iter()
            .find(|e| e.pc == ColoredPiece::new(color, Piece::King))
            .and_then(|e| Some((e.from?, e.to?)))
    }
}

#[derive(Clone, Debug)]
pub struct Position {
    board: Board,
}

impl Position {
    pub fn startpos() -> Self {
        Self { board: Board::default() }
    }

    pub fn from_fen(fen: &str) -> Result<Self, String> {
        Board::from_fen(fen, false)
            .map(|b| Self { board: b })
            .map_err(|e| format!("FEN error: {e:?}"))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    pub fn occupied(&self) -> BitBoard {
        self.board.occupied()
    }

    pub fn pieces(&self, color: Color) -> BitBoard {
        self.board.colors(color)
    }

    pub fn pieces_of(&self, color: Color, piece: Piece) -> BitBoard {
        self.board.colors(color) & self.board.pieces(piece)
    }

    pub fn piece_on(&self, sq: Square) -> Option<ColoredPiece> {
        let piece = self.board.piece_on(sq)?;
        let color = self.board.color_on(sq)?;
        Some(ColoredPiece::new(color, piece))
    }

    pub fn king(&self, color: Color) -> Square {
        self.board.king(color)
    }

    pub fn count(&self, color: Color, piece: Piece) -> i32 {
        self.pieces_of(color, piece).len() as i32
    }

    pub fn count_all(&self, piece: Piece) -> i32 {
        self.board.pieces(piece).len() as i32
    }

    pub fn rule50_count(&self) -> i32 {
        self.board.halfmove_clock() as i32
    }

    pub fn checkers(&self) -> BitBoard {
        self.board.checkers()
    }

    pub fn in_check(&self) -> bool {
        !self.board.checkers().is_empty()
    }

    pub fn non_pawn_material(&self, color: Color) -> Value {
        let mut npm = 0;
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            npm += piece_value(piece) * self.count(color, piece);
        }
        npm
    }

    pub fn non_pawn_material_total(&self) -> Value {
        self.non_pawn_material(Color::White) + self.non_pawn_material(Color::Black)
    }

    /// Squares from which a piece of `piece` belonging to the side to move
    /// would give check to the opposing king.
    pub fn check_squares(&self, piece: Piece) -> BitBoard {
        let them = !self.side_to_move();
        let ksq = self.king(them);
        let occ = self.occupied();
        match piece {
            Piece::Pawn => get_pawn_attacks(ksq, them),
            Piece::Knight => get_knight_moves(ksq),
            Piece::Bishop => get_bishop_moves(ksq, occ),
            Piece::Rook => get_rook_moves(ksq, occ),
            Piece::Queen => get_bishop_moves(ksq, occ) | get_rook_moves(ksq, occ),
            Piece::King => BitBoard::EMPTY,
        }
    }

    /// Union of the squares attacked by every `piece` of `color`.
    pub fn attacks_by(&self, piece: Piece, color: Color) -> BitBoard {
        let occ = self.occupied();
        let mut attacks = BitBoard::EMPTY;
        for sq in self.pieces_of(color, piece) {
            attacks |= match piece {
                Piece::Pawn => get_pawn_attacks(sq, color),
                Piece::Knight => get_knight_moves(sq),
                Piece::Bishop => get_bishop_moves(sq, occ),
                Piece::Rook => get_rook_moves(sq, occ),
                Piece::Queen => get_bishop_moves(sq, occ) | get_rook_moves(sq, occ),
                Piece::King => get_king_moves(sq),
            };
        }
        attacks
    }

    /// All pieces of either color attacking `sq` under `occupied`.
    pub fn attackers_to(&self, sq: Square, occupied: BitBoard) -> BitBoard {
        let b = &self.board;
        let bishops_queens = b.pieces(Piece::Bishop) | b.pieces(Piece::Queen);
        let rooks_queens = b.pieces(Piece::Rook) | b.pieces(Piece::Queen);
        (get_pawn_attacks(sq, Color::Black) & b.colors(Color::White) & b.pieces(Piece::Pawn))
            | (get_pawn_attacks(sq, Color::White) & b.colors(Color::Black) & b.pieces(Piece::Pawn))
            | (get_knight_moves(sq) & b.pieces(Piece::Knight))
            | (get_bishop_moves(sq, occupied) & bishops_queens)
            | (get_rook_moves(sq, occupied) & rooks_queens)
            | (get_king_moves(sq) & b.pieces(Piece::King))
    }

    /// The move-picker's TT gate. cozy-chess only hands out fully legal
    /// moves, so the gate checks legality rather than mere pseudo-legality.
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        self.board.is_legal(mv)
    }

    pub fn moved_piece(&self, mv: Move) -> ColoredPiece {
        self.piece_on(mv.from).expect("moved_piece: empty from-square")
    }

    fn is_castling(&self, mv: Move) -> bool {
        self.board.piece_on(mv.from) == Some(Piece::King)
            && self.board.color_on(mv.to) == Some(self.side_to_move())
            && self.board.piece_on(mv.to) == Some(Piece::Rook)
    }

    fn en_passant_square(&self) -> Option<Square> {
        let file = self.board.en_passant()?;
        let rank = match self.side_to_move() {
            Color::White => Rank::Sixth,
            Color::Black => Rank::Third,
        };
        Some(Square::new(file, rank))
    }

    fn is_en_passant(&self, mv: Move) -> bool {
        self.board.piece_on(mv.from) == Some(Piece::Pawn)
            && self.en_passant_square() == Some(mv.to)
    }

    /// True for captures (including en passant) and queen promotions, the
    /// move class the capture stages of the picker enumerate.
    pub fn capture_stage(&self, mv: Move) -> bool {
        self.is_capture(mv) || mv.promotion == Some(Piece::Queen)
    }

    pub fn is_capture(&self, mv: Move) -> bool {
        self.board.color_on(mv.to) == Some(!self.side_to_move()) || self.is_en_passant(mv)
    }

    /// The piece captured by `mv`, if any. Empty for en passant by design:
    /// the capture-scoring formula reads the destination square.
    pub fn victim(&self, mv: Move) -> Option<Piece> {
        if self.board.color_on(mv.to) == Some(!self.side_to_move()) {
            self.board.piece_on(mv.to)
        } else {
            None
        }
    }

    /// Index into the pawn-structure history, derived from a zobrist key
    /// over pawn placement only.
    pub fn pawn_structure_index(&self) -> usize {
        (zobrist::pawn_key(&self.board) & (crate::search::history::PAWN_HISTORY_SIZE as u64 - 1))
            as usize
    }

    /// Static Exchange Evaluation: true if the exchange sequence started
    /// by `mv` wins at least `threshold` centipawns.
    pub fn see_ge(&self, mv: Move, threshold: Value) -> bool {
        see::see_ge(self, mv, threshold)
    }

    /// Plays a legal move and reports the changed placements.
    pub fn play(&mut self, mv: Move) -> DirtyPiece {
        let us = self.side_to_move();
        let moved = self
            .board
            .piece_on(mv.from)
            .expect("play: no piece on from-square");

        let mut dirty = DirtyPiece::default();
        if self.is_castling(mv) {
            // cozy-chess encodes castling as king-takes-own-rook; report
            // the conventional king and rook destinations.
            let back = mv.from.rank();
            let short = (mv.to.file() as usize) > (mv.from.file() as usize);
            let (king_to, rook_to) = if short {
                (Square::new(File::G, back), Square::new(File::F, back))
            } else {
                (Square::new(File::C, back), Square::new(File::D, back))
            };
            dirty.push(ColoredPiece::new(us, Piece::King), Some(mv.from), Some(king_to));
            dirty.push(ColoredPiece::new(us, Piece::Rook), Some(mv.to), Some(rook_to));
        } else if let Some(promoted) = mv.promotion {
            dirty.push(ColoredPiece::new(us, Piece::Pawn), Some(mv.from), None);
            if let Some(victim) = self.victim(mv) {
                dirty.push(ColoredPiece::new(!us, victim), Some(mv.to), None);
            }
            dirty.push(ColoredPiece::new(us, promoted), None, Some(mv.to));
        } else {
            if self.is_en_passant(mv) {
                let victim_sq = Square::new(mv.to.file(), mv.from.rank());
                dirty.push(ColoredPiece::new(!us, Piece::Pawn), Some(victim_sq), None);
            } else if let Some(victim) = self.victim(mv) {
                dirty.push(ColoredPiece::new(!us, victim), Some(mv.to), None);
            }
            dirty.push(ColoredPiece::new(us, moved), Some(mv.from), Some(mv.to));
        }

        self.board.play(mv);
        dirty
    }

    /// Passes the move to the opponent, if legal. The dirty record is
    /// empty; incremental update degenerates to a copy.
    pub fn play_null(&mut self) -> Option<DirtyPiece> {
        self.board = self.board.null_move()?;
        Some(DirtyPiece::EMPTY)
    }

    /// Collects the legal moves of the requested class.
    pub fn generate(&self, class: MoveClass, out: &mut Vec<Move>) {
        out.clear();
        self.board.generate_moves(|mvs| {
            for mv in mvs {
                let keep = match class {
                    MoveClass::All => true,
                    MoveClass::Captures => self.capture_stage(mv),
                    MoveClass::Quiets => !self.capture_stage(mv),
                };
                if keep {
                    out.push(mv);
                }
            }
            false
        });
    }
}

/// Move classes handed to the generator by the picker stages. When the
/// side to move is in check, `All` is the evasion set.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveClass {
    All,
    Captures,
    Quiets,
}
