//! Search-side services: move ordering, history tables, the LMR
//! micro-network and time management. The alpha-beta driver itself lives
//! with the host.

pub mod history;
pub mod lmr;
pub mod movepick;
pub mod timeman;

pub use history::{Histories, HistoryBundle};
pub use lmr::{LmrNetwork, LmrParams};
pub use movepick::{MovePicker, RootMove, RootMoves};
pub use timeman::{EngineOptions, Limits, TimeManager, TimeParams};
