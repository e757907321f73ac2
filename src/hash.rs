const PLACEMENT_SEED: u64 = 0xcafe_f00d;

/// Sampling hash over a trace key.
///
/// SHARDS-style estimators compare this against their admission threshold,
/// so it must be deterministic and avalanche well.
pub fn hash64(key: u64) -> u64 {
    xxhash_rust::xxh3::xxh3_64(&key.to_le_bytes())
}

/// Slot-placement hash, independent of [`hash64`].
///
/// Re-seeded so that slot choice does not correlate with the admission
/// threshold filter.
pub fn placement64(key: u64) -> u64 {
    xxhash_rust::xxh3::xxh3_64_with_seed(&key.to_le_bytes(), PLACEMENT_SEED)
}
