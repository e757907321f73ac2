// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::histogram::OutOfBoundsMode;
use crate::shards::{scale_for_threshold, threshold_for_rate};
use crate::{
    hash::{hash64, placement64},
    Error, Estimator, Histogram, Key,
};

struct Slot {
    key: Key,
    last_access: u64,
}

/// Bounded-memory reuse-distance approximator
///
/// A fixed array of slots, addressed by a placement hash. Sampled keys
/// remember the sampled-access clock of their last access; a hit estimates
/// the stack distance from the clock delta, clamped by the number of live
/// slots (the distance cannot reach the tracked population). A placement
/// collision silently evicts the occupant, whose next access then counts as
/// a cold miss.
///
/// Constant memory and O(1) per access, at the cost of bias once the
/// working set outgrows `capacity / rate`.
pub struct EvictingMap {
    slots: Box<[Option<Slot>]>,
    histogram: Histogram,
    threshold: u64,
    scale: u64,
    clock: u64,
    live_slots: u64,
}

impl EvictingMap {
    /// Creates an evicting map with `capacity` slots, sampling keys at
    /// `sampling_rate`.
    ///
    /// # Errors
    ///
    /// Returns error, if the sampling rate is outside `(0, 1]`, `capacity`
    /// is zero, or the histogram dimensions are zero.
    pub fn new(
        sampling_rate: f64,
        capacity: u64,
        num_bins: u64,
        bin_size: u64,
    ) -> crate::Result<Self> {
        Self::with_mode(
            sampling_rate,
            capacity,
            num_bins,
            bin_size,
            OutOfBoundsMode::default(),
        )
    }

    /// Creates an evicting map with an explicit histogram out-of-bounds
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns error, if the sampling rate is outside `(0, 1]`, `capacity`
    /// is zero, or the histogram dimensions are zero.
    pub fn with_mode(
        sampling_rate: f64,
        capacity: u64,
        num_bins: u64,
        bin_size: u64,
        mode: OutOfBoundsMode,
    ) -> crate::Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig("capacity cannot be zero"));
        }

        let threshold = threshold_for_rate(sampling_rate)?;

        let slots = (0..capacity).map(|_| None).collect::<Vec<_>>().into_boxed_slice();

        Ok(Self {
            slots,
            histogram: Histogram::with_mode(num_bins, bin_size, mode)?,
            threshold,
            scale: scale_for_threshold(threshold),
            clock: 0,
            live_slots: 0,
        })
    }

    /// Returns the number of occupied slots.
    #[must_use]
    pub fn live_len(&self) -> u64 {
        self.live_slots
    }

    fn slot_index(&self, key: Key) -> usize {
        #[allow(clippy::cast_possible_truncation)]
        {
            (placement64(key) % self.slots.len() as u64) as usize
        }
    }
}

impl Estimator for EvictingMap {
    fn access(&mut self, key: Key) -> crate::Result<()> {
        if hash64(key) > self.threshold {
            return Ok(());
        }

        let now = self.clock;
        let scale = self.scale;
        let live_slots = self.live_slots;
        let idx = self.slot_index(key);

        #[expect(clippy::expect_used, reason = "slot index is reduced modulo capacity")]
        let slot = self.slots.get_mut(idx).expect("slot index should be in range");

        match slot {
            None => {
                *slot = Some(Slot {
                    key,
                    last_access: now,
                });
                self.live_slots += 1;
                self.histogram.insert_scaled_infinite(scale);
            }

            Some(occupant) if occupant.key == key => {
                // Sampled accesses since the previous access bound the
                // distinct keys in between; the live population bounds the
                // stack distance outright
                let gap = now - occupant.last_access - 1;
                let distance = gap.min(live_slots.saturating_sub(1));

                self.histogram.insert_scaled_finite(distance, scale)?;
                occupant.last_access = now;
            }

            Some(occupant) => {
                // Placement collision: drop the occupant, it will reappear
                // as a cold miss
                *occupant = Slot {
                    key,
                    last_access: now,
                };
                self.histogram.insert_scaled_infinite(scale);
            }
        }

        self.clock += 1;

        Ok(())
    }

    fn post_process(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn histogram(&self) -> &Histogram {
        &self.histogram
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::Olken;
    use test_log::test;

    #[test]
    fn distinct_intermediates_match_olken() {
        let mut map = EvictingMap::new(1.0, 4_096, 8, 1).unwrap();
        let mut olken = Olken::new(8, 1).unwrap();

        for key in [1, 2, 1, 2, 3, 1] {
            map.access(key).unwrap();
            olken.access(key).unwrap();
        }

        assert_eq!(olken.histogram(), map.histogram());
    }

    #[test]
    fn repeat_accesses_have_zero_distance() {
        let mut map = EvictingMap::new(1.0, 4, 4, 1).unwrap();

        for _ in 0..4 {
            map.access(7).unwrap();
        }

        let hist = map.histogram();
        assert_eq!(1, hist.infinity());
        assert_eq!([3, 0, 0, 0], *hist.bins());
        assert_eq!(1, map.live_len());
    }

    #[test]
    fn live_population_clamps_distance() {
        let mut map = EvictingMap::new(1.0, 4_096, 8, 1).unwrap();

        // the clock advances by 3 between the accesses to key 1, but only
        // 2 other distinct keys are live
        for key in [1, 2, 3, 3, 1] {
            map.access(key).unwrap();
        }

        let hist = map.histogram();
        assert_eq!(1, hist.bins()[2]);
    }

    #[test]
    fn collision_evicts_occupant() {
        let mut map = EvictingMap::new(1.0, 1, 4, 1).unwrap();

        map.access(1).unwrap();
        map.access(2).unwrap(); // evicts 1
        map.access(1).unwrap(); // cold again

        let hist = map.histogram();
        assert_eq!(3, hist.infinity());
        assert_eq!(3, hist.running_sum());
        assert_eq!(1, map.live_len());
    }
}
