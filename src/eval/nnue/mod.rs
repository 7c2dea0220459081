//! NNUE evaluation pipeline: feature set, feature transformer,
//! accumulator stack, king-square refresh cache and the per-bucket head.

pub mod accumulator;
pub mod cache;
pub mod features;
pub mod network;
pub mod transformer;

use std::path::Path;

pub use accumulator::{Accumulator, AccumulatorStack};
pub use cache::{Cache, CacheEntry, DUPLICATION};
pub use network::{Network, NetworkError};
pub use transformer::{FeatureTransformer, UpdateDirection};

/// Accumulator width of the big network.
pub const FT_BIG: usize = 256;
/// Accumulator width of the small network used at lopsided material.
pub const FT_SMALL: usize = 64;
/// PSQT side-channel buckets, selected by piece count.
pub const PSQT_BUCKETS: usize = 8;
/// Per-bucket head stacks.
pub const LAYER_STACKS: usize = 8;

/// The two network sizes, shared immutably across search threads.
pub struct Networks {
    pub big: Network<FT_BIG>,
    pub small: Network<FT_SMALL>,
}

impl Networks {
    /// Built-in default parameters for both sizes.
    pub fn embedded() -> Self {
        Self {
            big: Network::embedded(),
            small: Network::embedded(),
        }
    }

    /// Loads either size from disk, keeping the embedded parameters for
    /// paths that are not given.
    pub fn from_files(
        big: Option<&Path>,
        small: Option<&Path>,
    ) -> Result<Self, NetworkError> {
        let mut nets = Self::embedded();
        if let Some(path) = big {
            nets.big = Network::load_file(path)?;
        }
        if let Some(path) = small {
            nets.small = Network::load_file(path)?;
        }
        Ok(nets)
    }
}

/// Per-thread refresh caches for both network sizes. Created once per
/// thread, cleared to biases on net reload, persistent across searches.
pub struct AccumulatorCaches {
    pub big: Cache<FT_BIG>,
    pub small: Cache<FT_SMALL>,
}

impl AccumulatorCaches {
    pub fn new(networks: &Networks) -> Self {
        Self {
            big: Cache::new(&networks.big.transformer),
            small: Cache::new(&networks.small.transformer),
        }
    }

    pub fn clear(&mut self, networks: &Networks) {
        self.big.clear(&networks.big.transformer);
        self.small.clear(&networks.small.transformer);
    }
}
