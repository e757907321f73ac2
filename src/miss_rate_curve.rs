// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::Histogram;
use byteorder::{NativeEndian, WriteBytesExt};
use std::io::Write;
use std::path::Path;

/// Miss ratio curve, mapping cache size to the expected LRU miss ratio
///
/// Entry `k` is the fraction of accesses whose reuse distance is at least
/// `k * bin_size`, i.e. the accesses that would miss in an LRU cache holding
/// `k * bin_size` entries. The curve has `num_bins + 1` entries and is
/// weakly monotonically decreasing.
#[derive(Clone, Debug, PartialEq)]
pub struct MissRateCurve {
    miss_ratios: Box<[f64]>,
}

impl MissRateCurve {
    /// Computes the miss ratio curve of a reuse-distance histogram.
    ///
    /// An empty histogram (nothing inserted) yields an all-zero curve.
    #[must_use]
    pub fn from_histogram(histogram: &Histogram) -> Self {
        let mut miss_ratios = vec![0.0; histogram.bins().len() + 1].into_boxed_slice();

        if histogram.running_sum() == 0 {
            return Self { miss_ratios };
        }

        #[allow(clippy::cast_precision_loss)]
        let total = histogram.running_sum() as f64;

        // Walk the bins backwards, so each entry sees the suffix sum of
        // finite counts plus both overflow buckets
        let mut misses = histogram.infinity() + histogram.false_infinity();

        #[allow(clippy::cast_precision_loss)]
        if let Some(last) = miss_ratios.last_mut() {
            *last = misses as f64 / total;
        }

        #[allow(clippy::cast_precision_loss)]
        for (slot, bin) in miss_ratios
            .iter_mut()
            .rev()
            .skip(1)
            .zip(histogram.bins().iter().rev())
        {
            misses += *bin;
            *slot = misses as f64 / total;
        }

        Self { miss_ratios }
    }

    /// Returns the miss ratio per cache size, one entry per histogram bin
    /// boundary.
    #[must_use]
    pub fn miss_ratios(&self) -> &[f64] {
        &self.miss_ratios
    }

    /// Serializes the curve as a packed array of `f64` in host byte order.
    ///
    /// # Errors
    ///
    /// Returns error, if an I/O error occurs.
    pub fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        for ratio in &self.miss_ratios {
            writer.write_f64::<NativeEndian>(*ratio)?;
        }
        Ok(())
    }

    /// Writes the packed representation to a file.
    ///
    /// # Errors
    ///
    /// Returns error, if an I/O error occurs.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.encode_into(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// L2 distance between two curves, reading the shorter curve's missing
    /// tail as zero.
    #[must_use]
    pub fn euclidean_error(&self, other: &Self) -> f64 {
        let common = self.miss_ratios.len().min(other.miss_ratios.len());

        let mut sq_error = self
            .miss_ratios
            .iter()
            .zip(other.miss_ratios.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>();

        for ratio in self
            .miss_ratios
            .iter()
            .skip(common)
            .chain(other.miss_ratios.iter().skip(common))
        {
            sq_error += ratio * ratio;
        }

        sq_error.sqrt()
    }
}
