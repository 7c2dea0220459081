//! Per-ply accumulator frames and the lazy update walk.
//!
//! Each search thread owns one `AccumulatorStack`. A frame holds the
//! accumulators of both network sizes plus the `DirtyPiece` of the move
//! that led to it; nothing is recomputed until an evaluation actually
//! needs a perspective, at which point the stack walks back to the
//! nearest usable ancestor and replays the deltas, or refreshes from the
//! king-square cache when the king crossed a bucket boundary.

use cozy_chess::Color;

use super::cache::Cache;
use super::features;
use super::transformer::{FeatureTransformer, UpdateDirection};
use super::{FT_BIG, FT_SMALL, PSQT_BUCKETS};
use crate::board::{DirtyPiece, Position};
use crate::eval::MAX_PLY;

/// First-layer output for one network size: a 16-bit vector and the
/// 32-bit PSQT side channel, one half per perspective.
#[derive(Clone, Copy)]
#[repr(C, align(64))]
pub struct Accumulator<const D: usize> {
    pub values: [[i16; D]; 2],
    pub psqt: [[i32; PSQT_BUCKETS]; 2],
    pub computed: [bool; 2],
}

impl<const D: usize> Accumulator<D> {
    pub const fn new() -> Self {
        Self {
            values: [[0; D]; 2],
            psqt: [[0; PSQT_BUCKETS]; 2],
            computed: [false; 2],
        }
    }
}

impl<const D: usize> Default for Accumulator<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// One stack frame: both accumulators plus the move that produced it.
#[derive(Clone)]
pub struct AccumulatorState {
    pub big: Accumulator<FT_BIG>,
    pub small: Accumulator<FT_SMALL>,
    pub dirty: DirtyPiece,
}

impl AccumulatorState {
    fn new() -> Self {
        Self {
            big: Accumulator::new(),
            small: Accumulator::new(),
            dirty: DirtyPiece::EMPTY,
        }
    }
}

type SlotRef<const D: usize> = fn(&AccumulatorState) -> &Accumulator<D>;
type SlotMut<const D: usize> = fn(&mut AccumulatorState) -> &mut Accumulator<D>;

/// Bounded stack of accumulator frames, indexed by search ply. All
/// memory is allocated up front; push and pop never allocate.
pub struct AccumulatorStack {
    frames: Vec<AccumulatorState>,
    top: usize,
}

impl AccumulatorStack {
    pub fn new() -> Self {
        let mut frames = Vec::new();
        frames.resize_with(MAX_PLY + 1, AccumulatorState::new);
        Self { frames, top: 0 }
    }

    /// Returns the stack to a fresh root; nothing is computed until the
    /// first evaluation asks for it.
    pub fn reset(&mut self) {
        self.top = 0;
        let root = &mut self.frames[0];
        root.dirty = DirtyPiece::EMPTY;
        root.big.computed = [false; 2];
        root.small.computed = [false; 2];
    }

    pub fn push(&mut self, dirty: DirtyPiece) {
        debug_assert!(self.top + 1 < self.frames.len(), "push beyond max ply");
        if self.top + 1 < self.frames.len() {
            self.top += 1;
        }
        let frame = &mut self.frames[self.top];
        frame.dirty = dirty;
        frame.big.computed = [false; 2];
        frame.small.computed = [false; 2];
    }

    pub fn pop(&mut self) {
        debug_assert!(self.top > 0, "pop below root");
        self.top = self.top.saturating_sub(1);
    }

    pub fn ply(&self) -> usize {
        self.top
    }

    pub fn current_big(&self) -> &Accumulator<FT_BIG> {
        &self.frames[self.top].big
    }

    pub fn current_small(&self) -> &Accumulator<FT_SMALL> {
        &self.frames[self.top].small
    }

    /// Makes the current frame's big accumulator reflect `pos`.
    pub fn ensure_big(
        &mut self,
        pos: &Position,
        ft: &FeatureTransformer<FT_BIG>,
        cache: &mut Cache<FT_BIG>,
    ) {
        self.ensure(pos, ft, cache, |s| &s.big, |s| &mut s.big);
    }

    /// Makes the current frame's small accumulator reflect `pos`.
    pub fn ensure_small(
        &mut self,
        pos: &Position,
        ft: &FeatureTransformer<FT_SMALL>,
        cache: &mut Cache<FT_SMALL>,
    ) {
        self.ensure(pos, ft, cache, |s| &s.small, |s| &mut s.small);
    }

    fn ensure<const D: usize>(
        &mut self,
        pos: &Position,
        ft: &FeatureTransformer<D>,
        cache: &mut Cache<D>,
        slot: SlotRef<D>,
        slot_mut: SlotMut<D>,
    ) {
        for perspective in [Color::White, Color::Black] {
            let p = perspective as usize;
            if slot(&self.frames[self.top]).computed[p] {
                continue;
            }

            // Walk toward the root until a computed frame is found; a
            // king bucket crossing on the way makes incremental update
            // impossible for this perspective.
            let mut idx = self.top;
            let source = loop {
                if slot(&self.frames[idx]).computed[p] {
                    break Some(idx);
                }
                if idx == 0 || features::must_refresh(perspective, &self.frames[idx].dirty) {
                    break None;
                }
                idx -= 1;
            };

            match source {
                Some(src) => {
                    let ksq = pos.king(perspective);
                    for j in src + 1..=self.top {
                        let (before, after) = self.frames.split_at_mut(j);
                        let dirty = after[0].dirty;
                        ft.update_incremental(
                            perspective,
                            UpdateDirection::Forward,
                            ksq,
                            &dirty,
                            slot(&before[j - 1]),
                            slot_mut(&mut after[0]),
                        );
                    }
                }
                None => {
                    let ksq = pos.king(perspective);
                    let (best, _worst) = cache.get(ksq, perspective, pos);
                    ft.refresh_from_cache(pos, perspective, cache.entry_mut(best));
                    let entry = cache.entry(best);
                    let current = slot_mut(&mut self.frames[self.top]);
                    current.values[p] = entry.values;
                    current.psqt[p] = entry.psqt;
                    current.computed[p] = true;
                }
            }
        }
    }
}

impl Default for AccumulatorStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_track_ply() {
        let mut stack = AccumulatorStack::new();
        assert_eq!(stack.ply(), 0);
        stack.push(DirtyPiece::EMPTY);
        stack.push(DirtyPiece::EMPTY);
        assert_eq!(stack.ply(), 2);
        stack.pop();
        assert_eq!(stack.ply(), 1);
        stack.reset();
        assert_eq!(stack.ply(), 0);
    }

    #[test]
    fn push_invalidates_computed_flags() {
        let mut stack = AccumulatorStack::new();
        stack.push(DirtyPiece::EMPTY);
        assert_eq!(stack.current_big().computed, [false; 2]);
        assert_eq!(stack.current_small().computed, [false; 2]);
    }
}
