// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! SHARDS (Spatially Hashed Approximate Reuse Distance Sampling).
//!
//! A key is admitted when its sampling hash is at most the current
//! threshold, so every key is sampled with the same probability and the
//! rank distribution of reuse distances is preserved. Sampled counts (and
//! sampled distances) are scaled back up by the inverse sampling rate.

mod fixed_rate;
mod fixed_size;

pub use fixed_rate::FixedRateShards;
pub use fixed_size::FixedSizeShards;

use crate::Error;

/// Largest admissible hash value for a sampling rate in `(0, 1]`.
pub(crate) fn threshold_for_rate(rate: f64) -> crate::Result<u64> {
    if !(rate > 0.0 && rate <= 1.0) {
        return Err(Error::InvalidConfig("sampling rate must be in (0, 1]"));
    }

    // Saturates to u64::MAX for rate == 1.0
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let threshold = (rate * u64::MAX as f64) as u64;

    if threshold == 0 {
        return Err(Error::InvalidConfig("sampling rate is too small"));
    }

    Ok(threshold)
}

/// Number of true accesses each sampled access stands for.
pub(crate) fn scale_for_threshold(threshold: u64) -> u64 {
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    {
        (u64::MAX as f64 / threshold.max(1) as f64).round() as u64
    }
}

/// Effective sampling rate of a threshold.
pub(crate) fn rate_for_threshold(threshold: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        threshold as f64 / u64::MAX as f64
    }
}
