// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{EvictingMap, FixedRateShards, FixedSizeShards, Histogram, Key, Olken};
use enum_dispatch::enum_dispatch;

/// The capability set every reuse-distance estimator exposes to the driver
#[enum_dispatch]
pub trait Estimator {
    /// Processes a single trace access.
    ///
    /// # Errors
    ///
    /// Returns error, if a scaled histogram insert is rejected; the
    /// estimator's state is left at its pre-access value in that case.
    fn access(&mut self, key: Key) -> crate::Result<()>;

    /// Finalizes the histogram after the trace has been fully consumed.
    ///
    /// For the sampling estimators this applies the end-of-trace
    /// adjustment; for exact estimators it is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error, if finalization fails; the histogram stays readable.
    fn post_process(&mut self) -> crate::Result<()>;

    /// Returns the accumulated reuse-distance histogram.
    ///
    /// The borrow is bounded by the estimator's lifetime; callers read,
    /// the estimator owns.
    fn histogram(&self) -> &Histogram;
}

/// May be any of the four reuse-distance estimators
///
/// Lets a driver pick the algorithm once, at its outermost level, while the
/// per-access calls stay statically dispatched.
#[enum_dispatch(Estimator)]
pub enum AnyEstimator {
    /// Exact reuse distances, see [`Olken`]
    Olken(Olken),

    /// Fixed-rate spatial sampling, see [`FixedRateShards`]
    FixedRateShards(FixedRateShards),

    /// Fixed-cardinality adaptive sampling, see [`FixedSizeShards`]
    FixedSizeShards(FixedSizeShards),

    /// Bounded-memory approximation, see [`EvictingMap`]
    EvictingMap(EvictingMap),
}
