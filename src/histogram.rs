// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::Error;
use byteorder::{NativeEndian, WriteBytesExt};
use std::io::Write;
use std::path::Path;

/// Controls what happens when a rescaled reuse distance falls past the
/// histogram's tracked range
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OutOfBoundsMode {
    /// Count the insert in the false-infinity overflow bucket
    #[default]
    AllowOverflow,

    /// Fail the insert without mutating the histogram
    Reject,
}

/// Bucketed reuse-distance counters
///
/// Bin `i` covers distances `[i * bin_size, (i + 1) * bin_size)`. Finite
/// distances past the tracked range land in the false-infinity bucket,
/// cold misses in the infinity bucket.
///
/// Invariant: `running_sum` equals the sum of all bins plus both overflow
/// buckets at every quiescent point (between operations).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Histogram {
    bins: Box<[u64]>,
    bin_size: u64,
    false_infinity: u64,
    infinity: u64,
    running_sum: u64,
    mode: OutOfBoundsMode,
}

impl Histogram {
    /// Creates a histogram with `num_bins` bins of `bin_size` distances each.
    ///
    /// Out-of-range inserts overflow into the false-infinity bucket.
    ///
    /// # Errors
    ///
    /// Returns error, if `num_bins` or `bin_size` is zero.
    pub fn new(num_bins: u64, bin_size: u64) -> crate::Result<Self> {
        Self::with_mode(num_bins, bin_size, OutOfBoundsMode::default())
    }

    /// Creates a histogram with an explicit out-of-bounds mode.
    ///
    /// # Errors
    ///
    /// Returns error, if `num_bins` or `bin_size` is zero.
    pub fn with_mode(num_bins: u64, bin_size: u64, mode: OutOfBoundsMode) -> crate::Result<Self> {
        if num_bins == 0 {
            return Err(Error::InvalidConfig("histogram needs at least one bin"));
        }
        if bin_size == 0 {
            return Err(Error::InvalidConfig("histogram bin size cannot be zero"));
        }

        // NOTE: The number of bins is bounded by addressable memory,
        // so the u64 -> usize cast cannot truncate on 64-bit targets
        #[allow(clippy::cast_possible_truncation)]
        let bins = vec![0; num_bins as usize].into_boxed_slice();

        Ok(Self {
            bins,
            bin_size,
            false_infinity: 0,
            infinity: 0,
            running_sum: 0,
            mode,
        })
    }

    /// Returns the number of bins.
    #[must_use]
    pub fn num_bins(&self) -> u64 {
        self.bins.len() as u64
    }

    /// Returns the number of distances each bin covers.
    #[must_use]
    pub fn bin_size(&self) -> u64 {
        self.bin_size
    }

    /// Returns the finite bins.
    #[must_use]
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Returns the count of finite distances past the tracked range.
    #[must_use]
    pub fn false_infinity(&self) -> u64 {
        self.false_infinity
    }

    /// Returns the count of cold misses.
    #[must_use]
    pub fn infinity(&self) -> u64 {
        self.infinity
    }

    /// Returns the total weight of all inserts.
    #[must_use]
    pub fn running_sum(&self) -> u64 {
        self.running_sum
    }

    /// First distance past the tracked range.
    fn tracked_range(&self) -> u64 {
        self.num_bins() * self.bin_size
    }

    fn bin_index(&self, distance: u64) -> Option<usize> {
        if distance < self.tracked_range() {
            #[allow(clippy::cast_possible_truncation)]
            Some((distance / self.bin_size) as usize)
        } else {
            None
        }
    }

    #[expect(clippy::expect_used, reason = "bin_index only returns in-range indexes")]
    fn increment_bin(&mut self, idx: usize, weight: u64) {
        let bin = self.bins.get_mut(idx).expect("bin index should be in range");
        *bin += weight;
    }

    /// Counts a finite reuse distance.
    pub fn insert_finite(&mut self, distance: u64) {
        match self.bin_index(distance) {
            Some(idx) => self.increment_bin(idx, 1),
            None => self.false_infinity += 1,
        }
        self.running_sum += 1;
    }

    /// Counts a sampled finite reuse distance that stands for `scale` true
    /// accesses.
    ///
    /// The sampled distance also *underestimates* the true distance by the
    /// sampling factor, so the insert is bucketed at `distance * scale`.
    ///
    /// # Errors
    ///
    /// Returns error, if the rescaled distance falls past the tracked range
    /// and the histogram is in [`OutOfBoundsMode::Reject`] mode. The
    /// histogram is not mutated in that case.
    pub fn insert_scaled_finite(&mut self, distance: u64, scale: u64) -> crate::Result<()> {
        let scaled_index = distance.saturating_mul(scale);

        match self.bin_index(scaled_index) {
            Some(idx) => self.increment_bin(idx, scale),
            None if self.mode == OutOfBoundsMode::Reject => {
                return Err(Error::HistogramOverflow {
                    scaled_index,
                    tracked_range: self.tracked_range(),
                });
            }
            None => self.false_infinity += scale,
        }
        self.running_sum += scale;

        Ok(())
    }

    /// Counts a cold miss.
    pub fn insert_infinite(&mut self) {
        self.infinity += 1;
        self.running_sum += 1;
    }

    /// Counts a sampled cold miss that stands for `scale` true accesses.
    pub fn insert_scaled_infinite(&mut self, scale: u64) {
        self.infinity += scale;
        self.running_sum += scale;
    }

    /// Adds `adjustment` to the first bucket, used by the SHARDS end-of-trace
    /// correction.
    ///
    /// A negative adjustment that exceeds the first bucket cascades its
    /// residue into the following buckets. If the finite buckets cannot
    /// absorb all of it, the leftover is returned (and logged) and
    /// `running_sum` moves only by the portion actually applied.
    ///
    /// Returns the unapplied residual, 0 on full application.
    pub fn adjust_first_buckets(&mut self, adjustment: i64) -> i64 {
        let mut residual = adjustment;

        for bin in &mut self.bins {
            // NOTE: Bin counts are assumed to stay far below i64::MAX,
            // as are all other histogram counters
            #[allow(clippy::cast_possible_wrap)]
            let count = *bin as i64;

            if count + residual < 0 {
                *bin = 0;
                residual += count;
            } else {
                #[allow(clippy::cast_sign_loss)]
                {
                    *bin = (count + residual) as u64;
                }
                residual = 0;
                break;
            }
        }

        self.running_sum = self.running_sum.saturating_add_signed(adjustment - residual);

        if residual != 0 {
            log::warn!(
                "attempted adjustment ({adjustment}) exceeds what the finite buckets could absorb ({})",
                adjustment - residual,
            );
        }

        residual
    }

    /// Recomputes the running sum, returning `true` if it matches.
    ///
    /// A mismatch indicates an implementation bug; this is a diagnostic,
    /// not an operation that can fail in normal use.
    #[must_use]
    pub fn validate(&self) -> bool {
        let sum = self.bins.iter().sum::<u64>() + self.false_infinity + self.infinity;

        if sum != self.running_sum {
            log::error!("incorrect sum {sum} vs {}", self.running_sum);
            return false;
        }

        true
    }

    /// Serializes the nonzero bins as `(scaled_index, frequency)` pairs in
    /// host byte order.
    ///
    /// The overflow buckets are not part of the sparse format; the reader is
    /// expected to know `bin_size` out-of-band.
    ///
    /// # Errors
    ///
    /// Returns error, if an I/O error occurs.
    pub fn encode_sparse_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        for (idx, frequency) in self.bins.iter().enumerate().filter(|(_, f)| **f > 0) {
            writer.write_u64::<NativeEndian>(idx as u64 * self.bin_size)?;
            writer.write_u64::<NativeEndian>(*frequency)?;
        }
        Ok(())
    }

    /// Writes the sparse representation to a file.
    ///
    /// # Errors
    ///
    /// Returns error, if an I/O error occurs.
    pub fn save_sparse<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.encode_sparse_into(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes the histogram as a single JSON object, nonzero bins only.
    ///
    /// # Errors
    ///
    /// Returns error, if an I/O error occurs.
    pub fn write_json<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        write!(
            writer,
            "{{\"type\": \"Histogram\", \"num_bins\": {}, \"bin_size\": {}, \"running_sum\": {}, \"histogram\": {{",
            self.num_bins(),
            self.bin_size,
            self.running_sum,
        )?;

        let mut first_value = true;

        for (idx, frequency) in self.bins.iter().enumerate().filter(|(_, f)| **f > 0) {
            if first_value {
                first_value = false;
            } else {
                write!(writer, ", ")?;
            }
            write!(writer, "\"{}\": {frequency}", idx as u64 * self.bin_size)?;
        }

        writeln!(
            writer,
            "}}, \"false_infinity\": {}, \"infinity\": {}}}",
            self.false_infinity, self.infinity,
        )?;

        Ok(())
    }

    /// L2 distance between two histograms.
    ///
    /// Bins past the shorter histogram's range are read as zero; the
    /// overflow buckets are compared as well.
    #[must_use]
    pub fn euclidean_error(&self, other: &Self) -> f64 {
        let common = self.bins.len().min(other.bins.len());

        #[allow(clippy::cast_precision_loss)]
        let mut sq_error = self
            .bins
            .iter()
            .zip(other.bins.iter())
            .map(|(a, b)| {
                let diff = (*a as f64) - (*b as f64);
                diff * diff
            })
            .sum::<f64>();

        // Tail of the longer histogram, compared against implicit zeroes
        #[allow(clippy::cast_precision_loss)]
        for bin in self
            .bins
            .iter()
            .skip(common)
            .chain(other.bins.iter().skip(common))
        {
            sq_error += (*bin as f64) * (*bin as f64);
        }

        #[allow(clippy::cast_precision_loss)]
        {
            let diff = (self.false_infinity as f64) - (other.false_infinity as f64);
            sq_error += diff * diff;

            let diff = (self.infinity as f64) - (other.infinity as f64);
            sq_error += diff * diff;
        }

        sq_error.sqrt()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn histogram_rejects_zero_config() {
        assert!(Histogram::new(0, 1).is_err());
        assert!(Histogram::new(4, 0).is_err());
    }

    #[test]
    fn histogram_running_sum_invariant() {
        let mut hist = Histogram::new(4, 2).unwrap();

        hist.insert_finite(0);
        hist.insert_finite(3);
        hist.insert_finite(100); // past tracked range
        hist.insert_infinite();

        assert_eq!([1, 1, 0, 0], *hist.bins());
        assert_eq!(1, hist.false_infinity());
        assert_eq!(1, hist.infinity());
        assert_eq!(4, hist.running_sum());
        assert!(hist.validate());
    }

    #[test]
    fn histogram_scaled_insert_rescales_index() {
        let mut hist = Histogram::new(16, 1).unwrap();

        // sampled distance 3 at scale 4 stands for a true distance of 12
        hist.insert_scaled_finite(3, 4).unwrap();

        assert_eq!(4, hist.bins()[12]);
        assert_eq!(4, hist.running_sum());
        assert!(hist.validate());
    }

    #[test]
    fn histogram_reject_mode_does_not_mutate() {
        let mut hist = Histogram::with_mode(4, 1, OutOfBoundsMode::Reject).unwrap();
        hist.insert_finite(1);

        let before = hist.clone();
        assert!(hist.insert_scaled_finite(3, 2).is_err());
        assert_eq!(before, hist);
    }

    #[test]
    fn histogram_overflow_mode_counts_false_infinity() {
        let mut hist = Histogram::new(4, 1).unwrap();
        hist.insert_scaled_finite(3, 2).unwrap();

        assert_eq!(2, hist.false_infinity());
        assert_eq!(2, hist.running_sum());
    }

    #[test]
    fn adjust_roundtrip_restores_bins() {
        let mut hist = Histogram::new(4, 1).unwrap();
        for _ in 0..5 {
            hist.insert_finite(0);
        }
        let before = hist.clone();

        assert_eq!(0, hist.adjust_first_buckets(3));
        assert_eq!(0, hist.adjust_first_buckets(-3));
        assert_eq!(before, hist);
        assert!(hist.validate());
    }

    #[test]
    fn adjust_cascades_negative_residue() {
        let mut hist = Histogram::new(4, 1).unwrap();
        hist.insert_finite(0);
        hist.insert_finite(1);
        hist.insert_finite(1);
        hist.insert_finite(2);

        assert_eq!(0, hist.adjust_first_buckets(-2));
        assert_eq!([0, 1, 1, 0], *hist.bins());
        assert_eq!(2, hist.running_sum());
        assert!(hist.validate());
    }

    #[test]
    fn adjust_reports_unabsorbed_residue() {
        let mut hist = Histogram::new(4, 1).unwrap();
        hist.insert_finite(0);
        hist.insert_infinite();

        // Only one finite count can be absorbed
        assert_eq!(-2, hist.adjust_first_buckets(-3));
        assert_eq!([0, 0, 0, 0], *hist.bins());
        assert_eq!(1, hist.running_sum());
        assert!(hist.validate());
    }

    #[test]
    fn euclidean_error_compares_tails_and_overflow() {
        let mut a = Histogram::new(2, 1).unwrap();
        let mut b = Histogram::new(4, 1).unwrap();

        a.insert_finite(0);
        b.insert_finite(3);
        b.insert_infinite();

        // differences: bin 0 (1 vs 0), bin 3 (0 vs 1), infinity (0 vs 1)
        let expected = 3.0_f64.sqrt();
        assert!((a.euclidean_error(&b) - expected).abs() < f64::EPSILON);
        assert!((b.euclidean_error(&a) - expected).abs() < f64::EPSILON);
    }
}
