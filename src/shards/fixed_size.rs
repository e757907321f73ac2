// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{rate_for_threshold, scale_for_threshold, threshold_for_rate};
use crate::histogram::OutOfBoundsMode;
use crate::{hash::hash64, Error, Estimator, Histogram, Key, Olken};
use interval_heap::IntervalHeap;

#[derive(Eq)]
struct HeapItem {
    hash: u64,
    key: Key,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.hash.cmp(&other.hash))
    }
}

/// Fixed-size SHARDS estimator
///
/// Starts sampling at `starting_rate` and keeps at most `max_size` keys: when
/// the sample outgrows its budget, the key with the largest hash is evicted
/// and the admission threshold is lowered to that hash, so the sampling rate
/// only ever tightens. Histogram contributions made under earlier (larger)
/// thresholds keep their original scale, the known approximation of this
/// estimator.
pub struct FixedSizeShards {
    olken: Olken,
    threshold: u64,
    scale: u64,
    max_size: u64,
    heap: IntervalHeap<HeapItem>,
    total_accesses: u64,
    sampled_accesses: u64,
}

impl FixedSizeShards {
    /// Creates a fixed-size SHARDS estimator tracking at most `max_size`
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns error, if the starting rate is outside `(0, 1]`, `max_size`
    /// is zero, or the histogram dimensions are zero.
    pub fn new(
        starting_rate: f64,
        max_size: u64,
        num_bins: u64,
        bin_size: u64,
    ) -> crate::Result<Self> {
        Self::with_mode(
            starting_rate,
            max_size,
            num_bins,
            bin_size,
            OutOfBoundsMode::default(),
        )
    }

    /// Creates a fixed-size SHARDS estimator with an explicit histogram
    /// out-of-bounds mode.
    ///
    /// # Errors
    ///
    /// Returns error, if the starting rate is outside `(0, 1]`, `max_size`
    /// is zero, or the histogram dimensions are zero.
    pub fn with_mode(
        starting_rate: f64,
        max_size: u64,
        num_bins: u64,
        bin_size: u64,
        mode: OutOfBoundsMode,
    ) -> crate::Result<Self> {
        if max_size == 0 {
            return Err(Error::InvalidConfig("sample size cannot be zero"));
        }

        let threshold = threshold_for_rate(starting_rate)?;

        // NOTE: The sample overshoots by at most one key before shrinking
        #[allow(clippy::cast_possible_truncation)]
        let heap = IntervalHeap::with_capacity(max_size as usize + 1);

        Ok(Self {
            olken: Olken::with_mode(num_bins, bin_size, mode)?,
            threshold,
            scale: scale_for_threshold(threshold),
            max_size,
            heap,
            total_accesses: 0,
            sampled_accesses: 0,
        })
    }

    /// Returns the number of currently tracked (sampled) keys.
    #[must_use]
    pub fn sample_len(&self) -> u64 {
        self.heap.len() as u64
    }

    /// Returns the current admission threshold.
    ///
    /// Monotonically non-increasing over the run.
    #[must_use]
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Evicts the farthest-hash keys until the sample fits its budget,
    /// tightening the threshold as it goes.
    fn shrink(&mut self) {
        while self.sample_len() > self.max_size {
            let Some(farthest) = self.heap.pop_max() else {
                break;
            };

            self.threshold = farthest.hash;
            self.olken.remove_item(farthest.key);

            // Drain the ties, so the threshold is strictly tightened.
            // Prior histogram contributions of the evicted keys stay as
            // they were counted.
            loop {
                match self.heap.pop_max() {
                    Some(item) if item.hash == farthest.hash => {
                        self.olken.remove_item(item.key);
                    }
                    Some(item) => {
                        self.heap.push(item);
                        break;
                    }
                    None => break,
                }
            }

            self.scale = scale_for_threshold(self.threshold);
        }
    }
}

impl Estimator for FixedSizeShards {
    fn access(&mut self, key: Key) -> crate::Result<()> {
        self.total_accesses += 1;

        let hash = hash64(key);
        if hash > self.threshold {
            return Ok(());
        }
        self.sampled_accesses += 1;

        match self.olken.lookup(key) {
            Some(old_timestamp) => {
                let distance = self.olken.stack_distance(old_timestamp);
                self.olken
                    .histogram_mut()
                    .insert_scaled_finite(distance, self.scale)?;
                self.olken.update_stack(key, old_timestamp);
            }
            None => {
                self.olken.histogram_mut().insert_scaled_infinite(self.scale);
                self.olken.insert_stack(key);
                self.heap.push(HeapItem { hash, key });
            }
        }

        self.shrink();

        Ok(())
    }

    fn post_process(&mut self) -> crate::Result<()> {
        // SHARDS-Adj at the final threshold's effective rate
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let expected =
            (rate_for_threshold(self.threshold) * self.total_accesses as f64).round() as i64;

        #[allow(clippy::cast_possible_wrap)]
        let delta = (expected - self.sampled_accesses as i64) * self.scale as i64;

        if delta != 0 {
            self.olken.histogram_mut().adjust_first_buckets(delta);
        }

        Ok(())
    }

    fn histogram(&self) -> &Histogram {
        self.olken.histogram()
    }
}
