use rand::prelude::*;

/// Generates a seeded trace of `length` accesses drawn uniformly from
/// `working_set` keys.
#[must_use]
pub fn uniform_trace(seed: u64, length: usize, working_set: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..length).map(|_| rng.random_range(0..working_set)).collect()
}

/// Generates a seeded trace where half the accesses go to a small hot set.
#[must_use]
pub fn skewed_trace(seed: u64, length: usize, working_set: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let hot_set = (working_set / 16).max(1);

    (0..length)
        .map(|_| {
            if rng.random_bool(0.5) {
                rng.random_range(0..hot_set)
            } else {
                rng.random_range(0..working_set)
            }
        })
        .collect()
}
