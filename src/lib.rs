//! NNUE evaluation and move-ordering core for an alpha-beta engine.
//!
//! The board itself is cozy-chess, wrapped by [`board::Position`] into
//! the exact surface the core consumes. [`eval`] holds the NNUE pipeline
//! and the static-evaluation blend, [`search`] the staged move picker,
//! history tables, LMR network and time manager.

pub mod board;
pub mod eval;
pub mod search;
pub mod util;
