use rand::{RngExt, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

// pi * 100_000
pub const DEFAULT_SEED: u64 = 314159;

/// Deterministic generator used for initial partitions.
pub fn new() -> impl RngExt {
    with_seed(DEFAULT_SEED)
}

pub fn with_seed(seed: u64) -> impl RngExt {
    Xoshiro256PlusPlus::seed_from_u64(seed)
}
