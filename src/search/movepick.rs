//! Staged move picker.
//!
//! Emits one pseudo-legal move per call, most promising first, without
//! ever generating more than the search is going to consume: the TT move
//! goes out before anything is generated, captures before quiets, losing
//! captures and low-history quiets last. Each stage scores and partially
//! sorts only its own segment of a shared buffer.

use cozy_chess::{Move, Piece};

use super::history::{HistoryBundle, LOW_PLY_HISTORY_SIZE};
use crate::board::{piece_value, MoveClass, Position};
use crate::eval::Value;

/// Upper bound on buffered moves; no legal position exceeds it.
pub const MAX_MOVES: usize = 256;

#[derive(Clone, Copy, Debug)]
struct ExtMove {
    mv: Move,
    value: i32,
}

/// One entry of the persistent root move list owned by the search
/// driver. Root ordering replays the list by descending effort.
#[derive(Clone, Debug)]
pub struct RootMove {
    pub pv: Vec<Move>,
    pub score: Value,
    pub previous_score: Value,
    pub effort: u64,
    pub sel_depth: i32,
}

impl RootMove {
    pub fn new(mv: Move) -> Self {
        Self {
            pv: vec![mv],
            score: -crate::eval::VALUE_MATE,
            previous_score: -crate::eval::VALUE_MATE,
            effort: 0,
            sel_depth: 0,
        }
    }
}

pub type RootMoves = Vec<RootMove>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    MainTt,
    CaptureInit,
    GoodCapture,
    QuietInit,
    GoodQuiet,
    BadCapture,
    BadQuiet,
    EvasionTt,
    EvasionInit,
    Evasion,
    ProbcutTt,
    ProbcutInit,
    Probcut,
    RootTt,
    RootInit,
    Root,
    End,
}

#[inline]
fn quiet_threshold(depth: i32) -> i32 {
    -3560 * depth
}

/// Sorts the elements satisfying `pred` into a descending prefix; the
/// rest of the slice is left in unspecified order.
fn partial_insertion_sort(moves: &mut [ExtMove], pred: impl Fn(i32) -> bool) {
    if moves.is_empty() {
        return;
    }
    let mut sorted_end = 0usize;
    for p in 1..moves.len() {
        if pred(moves[p].value) {
            let tmp = moves[p];
            sorted_end += 1;
            moves[p] = moves[sorted_end];
            let mut q = sorted_end;
            while q > 0 && moves[q - 1].value < tmp.value {
                moves[q] = moves[q - 1];
                q -= 1;
            }
            moves[q] = tmp;
        }
    }
}

pub struct MovePicker<'a> {
    pos: &'a Position,
    hist: &'a HistoryBundle<'a>,
    tt_move: Option<Move>,
    depth: i32,
    ply: usize,
    threshold: Value,
    stage: Stage,
    moves: Vec<ExtMove>,
    cur: usize,
    end_moves: usize,
    end_bad_captures: usize,
    begin_bad_quiets: usize,
    end_bad_quiets: usize,
    skip_quiets: bool,
    root_moves: Option<&'a [RootMove]>,
}

impl<'a> MovePicker<'a> {
    /// Picker for the main search (`depth > 0`) and quiescence
    /// (`depth <= 0`, quiets skipped). Enters the evasion schedule when
    /// the side to move is in check.
    pub fn new(
        pos: &'a Position,
        tt_move: Option<Move>,
        depth: i32,
        ply: usize,
        hist: &'a HistoryBundle<'a>,
    ) -> Self {
        let tt_move = tt_move.filter(|&m| pos.is_pseudo_legal(m));
        let stage = if pos.in_check() {
            if tt_move.is_some() { Stage::EvasionTt } else { Stage::EvasionInit }
        } else if tt_move.is_some() {
            Stage::MainTt
        } else {
            Stage::CaptureInit
        };
        Self {
            pos,
            hist,
            tt_move,
            depth,
            ply,
            threshold: 0,
            stage,
            moves: Vec::with_capacity(MAX_MOVES),
            cur: 0,
            end_moves: 0,
            end_bad_captures: 0,
            begin_bad_quiets: 0,
            end_bad_quiets: 0,
            skip_quiets: depth <= 0,
            root_moves: None,
        }
    }

    /// ProbCut picker: captures whose SEE meets `threshold`. The TT move
    /// is only emitted when it is itself such a capture.
    pub fn new_probcut(
        pos: &'a Position,
        tt_move: Option<Move>,
        threshold: Value,
        hist: &'a HistoryBundle<'a>,
    ) -> Self {
        debug_assert!(!pos.in_check());
        let tt_move = tt_move.filter(|&m| {
            pos.capture_stage(m) && pos.is_pseudo_legal(m) && pos.see_ge(m, threshold)
        });
        let mut picker = Self::new(pos, None, 0, 0, hist);
        picker.tt_move = tt_move;
        picker.threshold = threshold;
        picker.stage = if tt_move.is_some() { Stage::ProbcutTt } else { Stage::ProbcutInit };
        picker
    }

    /// Switches this picker onto the persistent root list.
    pub fn setup_root(&mut self, root_moves: &'a [RootMove]) {
        self.root_moves = Some(root_moves);
        self.stage = if self.tt_move.is_some() { Stage::RootTt } else { Stage::RootInit };
    }

    /// Stop emitting quiet moves (good and bad) from now on.
    pub fn skip_quiet_moves(&mut self) {
        self.skip_quiets = true;
    }

    /// The next pseudo-legal move never returned before, or `None` when
    /// the enumeration is exhausted. Calling again after `None` keeps
    /// returning `None`.
    pub fn next_move(&mut self) -> Option<Move> {
        loop {
            match self.stage {
                Stage::MainTt | Stage::EvasionTt | Stage::ProbcutTt | Stage::RootTt => {
                    self.stage = match self.stage {
                        Stage::MainTt => Stage::CaptureInit,
                        Stage::EvasionTt => Stage::EvasionInit,
                        Stage::ProbcutTt => Stage::ProbcutInit,
                        _ => Stage::RootInit,
                    };
                    debug_assert!(self.tt_move.is_some());
                    return self.tt_move;
                }

                Stage::CaptureInit | Stage::ProbcutInit => {
                    self.generate_captures();
                    self.score_captures();
                    partial_insertion_sort(&mut self.moves[..self.end_moves], |_| true);
                    self.stage = if self.stage == Stage::CaptureInit {
                        Stage::GoodCapture
                    } else {
                        Stage::Probcut
                    };
                }

                Stage::GoodCapture => {
                    while self.cur < self.end_moves {
                        let m = self.moves[self.cur];
                        self.cur += 1;
                        if Some(m.mv) == self.tt_move {
                            continue;
                        }
                        if self.pos.see_ge(m.mv, -m.value / 18) {
                            return Some(m.mv);
                        }
                        // Losing capture: park it for the bad-capture stage.
                        self.moves[self.end_bad_captures] = m;
                        self.end_bad_captures += 1;
                    }
                    self.stage = Stage::QuietInit;
                }

                Stage::QuietInit => {
                    self.begin_bad_quiets = self.end_bad_captures;
                    self.end_bad_quiets = self.end_bad_captures;
                    if !self.skip_quiets {
                        self.cur = self.end_bad_captures;
                        self.generate_quiets();
                        self.score_quiets();
                        self.begin_bad_quiets = self.end_moves;
                        self.end_bad_quiets = self.end_moves;
                        let threshold = quiet_threshold(self.depth);
                        partial_insertion_sort(
                            &mut self.moves[self.cur..self.end_moves],
                            move |value| value >= threshold,
                        );
                    }
                    self.stage = Stage::GoodQuiet;
                }

                Stage::GoodQuiet => {
                    if !self.skip_quiets {
                        while self.cur < self.end_moves {
                            let m = self.moves[self.cur];
                            self.cur += 1;
                            if Some(m.mv) == self.tt_move {
                                continue;
                            }
                            if m.value > -7998 || m.value <= quiet_threshold(self.depth) {
                                return Some(m.mv);
                            }
                            // Everything from here on is a bad quiet.
                            self.begin_bad_quiets = self.cur - 1;
                            break;
                        }
                    }
                    self.cur = 0;
                    self.end_moves = self.end_bad_captures;
                    self.stage = Stage::BadCapture;
                }

                Stage::BadCapture => {
                    while self.cur < self.end_moves {
                        let m = self.moves[self.cur];
                        self.cur += 1;
                        if Some(m.mv) == self.tt_move {
                            continue;
                        }
                        return Some(m.mv);
                    }
                    self.cur = self.begin_bad_quiets;
                    self.end_moves = self.end_bad_quiets;
                    self.stage = Stage::BadQuiet;
                }

                Stage::BadQuiet => {
                    if !self.skip_quiets {
                        while self.cur < self.end_moves {
                            let m = self.moves[self.cur];
                            self.cur += 1;
                            if Some(m.mv) == self.tt_move {
                                continue;
                            }
                            return Some(m.mv);
                        }
                    }
                    self.stage = Stage::End;
                }

                Stage::EvasionInit => {
                    self.generate_all();
                    self.score_evasions();
                    partial_insertion_sort(&mut self.moves[..self.end_moves], |_| true);
                    self.stage = Stage::Evasion;
                }

                Stage::Evasion => {
                    while self.cur < self.end_moves {
                        let m = self.moves[self.cur];
                        self.cur += 1;
                        if Some(m.mv) == self.tt_move {
                            continue;
                        }
                        return Some(m.mv);
                    }
                    self.stage = Stage::End;
                }

                Stage::Probcut => {
                    while self.cur < self.end_moves {
                        let m = self.moves[self.cur];
                        self.cur += 1;
                        if Some(m.mv) == self.tt_move {
                            continue;
                        }
                        if self.pos.see_ge(m.mv, self.threshold) {
                            return Some(m.mv);
                        }
                    }
                    self.stage = Stage::End;
                }

                Stage::RootInit => {
                    let root = self.root_moves.expect("setup_root not called");
                    let mut order: Vec<&RootMove> = root.iter().collect();
                    order.sort_by(|a, b| b.effort.cmp(&a.effort));
                    self.moves.clear();
                    for rm in order {
                        if let Some(&mv) = rm.pv.first() {
                            self.moves.push(ExtMove { mv, value: 0 });
                        }
                    }
                    self.cur = 0;
                    self.end_moves = self.moves.len();
                    self.stage = Stage::Root;
                }

                Stage::Root => {
                    while self.cur < self.end_moves {
                        let m = self.moves[self.cur];
                        self.cur += 1;
                        if Some(m.mv) == self.tt_move {
                            continue;
                        }
                        return Some(m.mv);
                    }
                    self.stage = Stage::End;
                }

                Stage::End => return None,
            }
        }
    }

    fn generate_captures(&mut self) {
        let mut list = Vec::with_capacity(64);
        self.pos.generate(MoveClass::Captures, &mut list);
        self.moves.clear();
        self.moves.extend(list.into_iter().map(|mv| ExtMove { mv, value: 0 }));
        self.cur = 0;
        self.end_bad_captures = 0;
        self.end_moves = self.moves.len();
    }

    fn generate_quiets(&mut self) {
        let mut list = Vec::with_capacity(128);
        self.pos.generate(MoveClass::Quiets, &mut list);
        self.moves.truncate(self.end_bad_captures);
        self.moves.extend(list.into_iter().map(|mv| ExtMove { mv, value: 0 }));
        self.end_moves = self.moves.len();
    }

    fn generate_all(&mut self) {
        let mut list = Vec::with_capacity(64);
        self.pos.generate(MoveClass::All, &mut list);
        self.moves.clear();
        self.moves.extend(list.into_iter().map(|mv| ExtMove { mv, value: 0 }));
        self.cur = 0;
        self.end_moves = self.moves.len();
    }

    /// Captures: most valuable victim, corrected by capture history.
    fn score_captures(&mut self) {
        for m in &mut self.moves[..self.end_moves] {
            let moved = self.pos.moved_piece(m.mv);
            let victim = self.pos.victim(m.mv);
            let victim_value = victim.map_or(0, piece_value);
            m.value = 7 * victim_value + self.hist.capture.get(moved, m.mv.to, victim);
        }
    }

    /// Quiets: butterfly, pawn-structure and continuation histories,
    /// check bonus, and threat bonuses for moving a piece out of (or
    /// into) an attack by something cheaper.
    fn score_quiets(&mut self) {
        let pos = self.pos;
        let us = pos.side_to_move();
        let pawn_index = pos.pawn_structure_index();

        let threatened_by_pawn = pos.attacks_by(Piece::Pawn, !us);
        let threatened_by_minor = pos.attacks_by(Piece::Knight, !us)
            | pos.attacks_by(Piece::Bishop, !us)
            | threatened_by_pawn;
        let threatened_by_rook = pos.attacks_by(Piece::Rook, !us) | threatened_by_minor;

        // Pieces threatened by pieces of lesser material value.
        let threatened_pieces = (pos.pieces_of(us, Piece::Queen) & threatened_by_rook)
            | (pos.pieces_of(us, Piece::Rook) & threatened_by_minor)
            | ((pos.pieces_of(us, Piece::Knight) | pos.pieces_of(us, Piece::Bishop))
                & threatened_by_pawn);

        for m in &mut self.moves[self.cur..self.end_moves] {
            let pc = pos.moved_piece(m.mv);
            let pt = pc.piece;
            let from = m.mv.from;
            let to = m.mv.to;

            let mut value = 2 * self.hist.butterfly.get(us, m.mv);
            value += 2 * self.hist.pawn.get(pawn_index, pc, to);
            for (k, slice) in self.hist.continuation.iter().enumerate() {
                if let Some(slice) = slice {
                    let term = slice.get(pc, to);
                    value += if k == 4 { term / 3 } else { term };
                }
            }

            if pos.check_squares(pt).has(to) {
                value += 16384;
            }

            if threatened_pieces.has(from) {
                value += if pt == Piece::Queen && !threatened_by_rook.has(to) {
                    51700
                } else if pt == Piece::Rook && !threatened_by_minor.has(to) {
                    25600
                } else if !threatened_by_pawn.has(to) {
                    14450
                } else {
                    0
                };
            }

            value -= if pt == Piece::Queen && threatened_by_rook.has(to) {
                49000
            } else if pt == Piece::Rook && threatened_by_minor.has(to) {
                24335
            } else {
                0
            };

            if self.ply < LOW_PLY_HISTORY_SIZE {
                value += 8 * self.hist.low_ply.get(self.ply, m.mv) / (1 + 2 * self.ply as i32);
            }

            m.value = value;
        }
    }

    /// Evasions: any capture outranks any quiet; quiets fall back to
    /// history.
    fn score_evasions(&mut self) {
        let pos = self.pos;
        let us = pos.side_to_move();
        let pawn_index = pos.pawn_structure_index();
        for m in &mut self.moves[..self.end_moves] {
            if pos.capture_stage(m.mv) {
                let victim_value = pos.victim(m.mv).map_or(0, piece_value);
                m.value = victim_value + (1 << 28);
            } else {
                let pc = pos.moved_piece(m.mv);
                m.value = self.hist.butterfly.get(us, m.mv)
                    + self.hist.continuation[0].map_or(0, |s| s.get(pc, m.mv.to))
                    + self.hist.pawn.get(pawn_index, pc, m.mv.to);
            }
        }
    }
}
