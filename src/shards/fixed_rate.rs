// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{scale_for_threshold, threshold_for_rate};
use crate::histogram::OutOfBoundsMode;
use crate::{hash::hash64, Estimator, Histogram, Key, Olken};

/// Fixed-rate SHARDS estimator
///
/// Olken behind a constant hash threshold: a fixed fraction `rate` of all
/// keys is tracked exactly, every histogram contribution is scaled by
/// `1 / rate`, and the end-of-trace adjustment repairs the difference
/// between the expected and the actual sampled count.
///
/// At `rate = 1.0` this degenerates to exact Olken.
pub struct FixedRateShards {
    olken: Olken,
    threshold: u64,
    scale: u64,
    sampling_rate: f64,
    adjustment: bool,
    total_accesses: u64,
    sampled_accesses: u64,
}

impl FixedRateShards {
    /// Creates a fixed-rate SHARDS estimator with the end-of-trace
    /// adjustment enabled.
    ///
    /// # Errors
    ///
    /// Returns error, if the sampling rate is outside `(0, 1]` or the
    /// histogram dimensions are zero.
    pub fn new(sampling_rate: f64, num_bins: u64, bin_size: u64) -> crate::Result<Self> {
        Self::with_mode(sampling_rate, num_bins, bin_size, OutOfBoundsMode::default())
    }

    /// Creates a fixed-rate SHARDS estimator with an explicit histogram
    /// out-of-bounds mode.
    ///
    /// # Errors
    ///
    /// Returns error, if the sampling rate is outside `(0, 1]` or the
    /// histogram dimensions are zero.
    pub fn with_mode(
        sampling_rate: f64,
        num_bins: u64,
        bin_size: u64,
        mode: OutOfBoundsMode,
    ) -> crate::Result<Self> {
        let threshold = threshold_for_rate(sampling_rate)?;

        Ok(Self {
            olken: Olken::with_mode(num_bins, bin_size, mode)?,
            threshold,
            scale: scale_for_threshold(threshold),
            sampling_rate,
            adjustment: true,
            total_accesses: 0,
            sampled_accesses: 0,
        })
    }

    /// Toggles the SHARDS-Adj end-of-trace correction.
    ///
    /// Enabled by default.
    #[must_use]
    pub fn adjustment(mut self, enabled: bool) -> Self {
        self.adjustment = enabled;
        self
    }

    /// Returns the number of currently tracked (sampled) keys.
    #[must_use]
    pub fn tracked_len(&self) -> u64 {
        self.olken.tracked_len()
    }
}

impl Estimator for FixedRateShards {
    fn access(&mut self, key: Key) -> crate::Result<()> {
        self.total_accesses += 1;

        if hash64(key) > self.threshold {
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
            }
        }

        Ok(())
    }

    fn post_process(&mut self) -> crate::Result<()> {
        if !self.adjustment {
            return Ok(());
        }

        // SHARDS-Adj: the histogram was scaled as if exactly
        // rate * total accesses had been sampled
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let expected = (self.sampling_rate * self.total_accesses as f64).round() as i64;

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

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn rate_one_matches_olken_exactly() {
        let mut shards = FixedRateShards::new(1.0, 8, 1).unwrap();
        let mut olken = Olken::new(8, 1).unwrap();

        for key in [1, 2, 1, 2, 3, 1] {
            shards.access(key).unwrap();
            olken.access(key).unwrap();
        }
        shards.post_process().unwrap();

        assert_eq!(olken.histogram(), shards.histogram());
    }

    #[test]
    fn subsampling_scales_counts() {
        let mut shards = FixedRateShards::new(0.5, 64, 1).unwrap().adjustment(false);

        for key in 0..512u64 {
            shards.access(key).unwrap();
        }

        let hist = shards.histogram();

        // every sampled cold miss counts double
        assert_eq!(hist.running_sum(), hist.infinity());
        assert_eq!(0, hist.infinity() % 2);
        assert!(hist.infinity() > 0);
        assert!(hist.validate());

        // roughly half of the keys pass the threshold
        let sampled = hist.infinity() / 2;
        assert!((150..=350).contains(&sampled), "sampled {sampled} of 512");
    }

    #[test]
    fn adjustment_compensates_sampling_variance() {
        let mut adjusted = FixedRateShards::new(0.5, 64, 1).unwrap();
        let mut raw = FixedRateShards::new(0.5, 64, 1).unwrap().adjustment(false);

        for key in 0..256u64 {
            // access each key twice, so every sampled key contributes a hit
            adjusted.access(key).unwrap();
            adjusted.access(key).unwrap();
            raw.access(key).unwrap();
            raw.access(key).unwrap();
        }
        adjusted.post_process().unwrap();
        raw.post_process().unwrap();

        // the adjustment only moves the first buckets
        assert_eq!(raw.histogram().infinity(), adjusted.histogram().infinity());
        assert!(adjusted.histogram().validate());
    }
}
