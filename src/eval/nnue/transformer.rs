//! The first network layer: per-feature weight columns summed into an
//! accumulator per perspective, with a 32-bit PSQT side channel.
//!
//! All kernels are scalar i16/i32; the column sums are trained to stay in
//! range so the additions do not saturate.

use cozy_chess::{Color, Square};

use super::accumulator::Accumulator;
use super::cache::CacheEntry;
use super::features::{self, ActiveList, ChangedList, DIMENSIONS};
use super::PSQT_BUCKETS;
use crate::board::{DirtyPiece, Position};
use crate::util::AlignedBox;

/// Direction of an incremental update along the stack. Backward swaps
/// the roles of the added and removed feature lists, undoing a move's
/// delta instead of applying it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UpdateDirection {
    Forward,
    Backward,
}

pub struct FeatureTransformer<const D: usize> {
    /// `[D]`
    pub biases: AlignedBox<i16>,
    /// `[DIMENSIONS][D]`, column-major per feature.
    pub weights: AlignedBox<i16>,
    /// `[DIMENSIONS][PSQT_BUCKETS]`
    pub psqt_weights: AlignedBox<i32>,
}

impl<const D: usize> FeatureTransformer<D> {
    pub fn new_zeroed() -> Self {
        Self {
            biases: AlignedBox::new_zeroed(D),
            weights: AlignedBox::new_zeroed(DIMENSIONS * D),
            psqt_weights: AlignedBox::new_zeroed(DIMENSIONS * PSQT_BUCKETS),
        }
    }

    #[inline]
    fn add_column(&self, index: usize, values: &mut [i16; D], psqt: &mut [i32; PSQT_BUCKETS]) {
        let col = &self.weights[index * D..index * D + D];
        for (v, &w) in values.iter_mut().zip(col) {
            *v = v.wrapping_add(w);
        }
        let pcol = &self.psqt_weights[index * PSQT_BUCKETS..index * PSQT_BUCKETS + PSQT_BUCKETS];
        for (v, &w) in psqt.iter_mut().zip(pcol) {
            *v += w;
        }
    }

    #[inline]
    fn sub_column(&self, index: usize, values: &mut [i16; D], psqt: &mut [i32; PSQT_BUCKETS]) {
        let col = &self.weights[index * D..index * D + D];
        for (v, &w) in values.iter_mut().zip(col) {
            *v = v.wrapping_sub(w);
        }
        let pcol = &self.psqt_weights[index * PSQT_BUCKETS..index * PSQT_BUCKETS + PSQT_BUCKETS];
        for (v, &w) in psqt.iter_mut().zip(pcol) {
            *v -= w;
        }
    }

    /// Rebuilds one perspective of `acc` from scratch.
    pub fn refresh(&self, pos: &Position, perspective: Color, acc: &mut Accumulator<D>) {
        let p = perspective as usize;
        acc.values[p].copy_from_slice(&self.biases);
        acc.psqt[p] = [0; PSQT_BUCKETS];

        let mut active = ActiveList::new();
        features::append_active(pos, perspective, &mut active);
        let (values, psqt) = {
            let Accumulator { values, psqt, .. } = acc;
            (&mut values[p], &mut psqt[p])
        };
        for index in active.iter() {
            self.add_column(index, values, psqt);
        }
        acc.computed[p] = true;
    }

    /// Computes `next` from `prev` using the move delta recorded in
    /// `dirty`. `ksq` is the perspective king square of the position the
    /// target frame describes; the caller guarantees the king did not
    /// cross a bucket boundary between the two frames.
    pub fn update_incremental(
        &self,
        perspective: Color,
        direction: UpdateDirection,
        ksq: Square,
        dirty: &DirtyPiece,
        prev: &Accumulator<D>,
        next: &mut Accumulator<D>,
    ) {
        let p = perspective as usize;
        debug_assert!(prev.computed[p]);

        let mut removed = ChangedList::new();
        let mut added = ChangedList::new();
        features::append_changed(perspective, ksq, dirty, &mut removed, &mut added);
        if direction == UpdateDirection::Backward {
            std::mem::swap(&mut removed, &mut added);
        }

        next.values[p] = prev.values[p];
        next.psqt[p] = prev.psqt[p];
        let (values, psqt) = {
            let Accumulator { values, psqt, .. } = next;
            (&mut values[p], &mut psqt[p])
        };
        for index in removed.iter() {
            self.sub_column(index, values, psqt);
        }
        for index in added.iter() {
            self.add_column(index, values, psqt);
        }
        next.computed[p] = true;
    }

    /// Brings a cache entry up to date with `pos` by add/sub over the
    /// symmetric difference of its bitboard snapshot and the board. The
    /// entry afterwards holds the exact accumulator for `pos` from
    /// `perspective` and a fresh snapshot.
    pub fn refresh_from_cache(
        &self,
        pos: &Position,
        perspective: Color,
        entry: &mut CacheEntry<D>,
    ) {
        use cozy_chess::Piece;

        let ksq = pos.king(perspective);
        for color in [Color::White, Color::Black] {
            for piece in [
                Piece::Pawn,
                Piece::Knight,
                Piece::Bishop,
                Piece::Rook,
                Piece::Queen,
                Piece::King,
            ] {
                let old = entry.by_color[color as usize] & entry.by_type[piece as usize];
                let new = pos.pieces_of(color, piece);
                let pc = crate::board::ColoredPiece::new(color, piece);
                for sq in old & !new {
                    let index = features::index(perspective, ksq, pc, sq);
                    self.sub_column(index, &mut entry.values, &mut entry.psqt);
                }
                for sq in new & !old {
                    let index = features::index(perspective, ksq, pc, sq);
                    self.add_column(index, &mut entry.values, &mut entry.psqt);
                }
            }
        }
        entry.snapshot(pos);
    }

    /// Clipped ReLU of both perspective halves into `out`, side to move
    /// first. `out.len() == 2 * D`.
    pub fn transform(&self, acc: &Accumulator<D>, stm: Color, out: &mut [u8]) {
        debug_assert_eq!(out.len(), 2 * D);
        for (half, perspective) in [stm, !stm].into_iter().enumerate() {
            let values = &acc.values[perspective as usize];
            let slot = &mut out[half * D..half * D + D];
            for (o, &v) in slot.iter_mut().zip(values.iter()) {
                *o = v.clamp(0, 127) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::nnue::cache::Cache;

    const D: usize = 16;

    fn test_transformer() -> FeatureTransformer<D> {
        let mut ft = FeatureTransformer::<D>::new_zeroed();
        // Distinct, reproducible column contents.
        for (i, w) in ft.weights.iter_mut().enumerate() {
            *w = ((i * 31 + 7) % 53) as i16 - 26;
        }
        for (i, b) in ft.biases.iter_mut().enumerate() {
            *b = i as i16 - 8;
        }
        for (i, w) in ft.psqt_weights.iter_mut().enumerate() {
            *w = ((i * 17) % 29) as i32 - 14;
        }
        ft
    }

    #[test]
    fn incremental_update_matches_refresh() {
        let ft = test_transformer();
        let mut pos = Position::startpos();
        let mut before = Accumulator::<D>::new();
        ft.refresh(&pos, Color::White, &mut before);
        ft.refresh(&pos, Color::Black, &mut before);

        let dirty = pos.play("e2e4".parse().unwrap());
        for perspective in [Color::White, Color::Black] {
            let mut incremental = Accumulator::<D>::new();
            ft.update_incremental(
                perspective,
                UpdateDirection::Forward,
                pos.king(perspective),
                &dirty,
                &before,
                &mut incremental,
            );
            let mut full = Accumulator::<D>::new();
            ft.refresh(&pos, perspective, &mut full);
            let p = perspective as usize;
            assert_eq!(incremental.values[p], full.values[p]);
            assert_eq!(incremental.psqt[p], full.psqt[p]);
        }
    }

    #[test]
    fn backward_update_undoes_forward() {
        let ft = test_transformer();
        let mut pos = Position::startpos();
        let mut root = Accumulator::<D>::new();
        ft.refresh(&pos, Color::White, &mut root);

        let dirty = pos.play("b1c3".parse().unwrap());
        let ksq = pos.king(Color::White);
        let mut child = Accumulator::<D>::new();
        ft.update_incremental(
            Color::White,
            UpdateDirection::Forward,
            ksq,
            &dirty,
            &root,
            &mut child,
        );
        let mut back = Accumulator::<D>::new();
        ft.update_incremental(
            Color::White,
            UpdateDirection::Backward,
            ksq,
            &dirty,
            &child,
            &mut back,
        );
        let p = Color::White as usize;
        assert_eq!(back.values[p], root.values[p]);
        assert_eq!(back.psqt[p], root.psqt[p]);
    }

    #[test]
    fn cache_refresh_equals_full_refresh() {
        let ft = test_transformer();
        let pos = Position::from_fen(
            "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3",
        )
        .unwrap();
        let mut cache = Cache::<D>::new(&ft);
        for perspective in [Color::White, Color::Black] {
            let ksq = pos.king(perspective);
            let (best, _) = cache.get(ksq, perspective, &pos);
            ft.refresh_from_cache(&pos, perspective, cache.entry_mut(best));

            let mut full = Accumulator::<D>::new();
            ft.refresh(&pos, perspective, &mut full);
            let p = perspective as usize;
            assert_eq!(cache.entry(best).values, full.values[p]);
            assert_eq!(cache.entry(best).psqt, full.psqt[p]);
        }
    }

    #[test]
    fn transform_clips_to_0_127() {
        let ft = FeatureTransformer::<D>::new_zeroed();
        let mut acc = Accumulator::<D>::new();
        acc.values[0][0] = -500;
        acc.values[0][1] = 500;
        acc.values[0][2] = 64;
        let mut out = [0u8; 2 * D];
        ft.transform(&acc, Color::White, &mut out);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 127);
        assert_eq!(out[2], 64);
    }
}
