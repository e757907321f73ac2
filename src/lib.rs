// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A K.I.S.S. implementation of miss ratio curve (MRC) estimation.
//!
//! ##### About
//!
//! A miss ratio curve maps cache size to the expected miss ratio of an LRU
//! cache of that size, the foundational artifact for cache sizing and
//! capacity planning. This crate computes MRCs from reference traces by
//! tracking *reuse distances* (a.k.a. stack distances): the number of
//! distinct keys touched between successive accesses to the same key.
//!
//! Four estimators are provided:
//!
//! - [`Olken`]: exact reuse distances via an order-statistic tree. The
//!   oracle; memory grows with the number of unique keys.
//! - [`FixedRateShards`]: SHARDS spatial sampling at a fixed rate, with
//!   the end-of-trace adjustment.
//! - [`FixedSizeShards`]: SHARDS with a bounded sample whose admission
//!   threshold tightens adaptively.
//! - [`EvictingMap`]: constant-memory, constant-time approximation over a
//!   fixed slot array.
//!
//! All of them accumulate a reuse-distance [`Histogram`] from which the
//! [`MissRateCurve`] is derived after the trace is fully consumed.
//!
//! # Example usage
//!
//! ```
//! use mrc::{Estimator, MissRateCurve, Olken};
//!
//! let mut olken = Olken::new(/* bins */ 1_000, /* bin size */ 1)?;
//!
//! for key in [1, 2, 3, 1, 2, 3] {
//!     olken.access(key)?;
//! }
//! olken.post_process()?;
//!
//! let mrc = MissRateCurve::from_histogram(olken.histogram());
//!
//! // every access misses in a cache of size 0
//! assert_eq!(Some(&1.0), mrc.miss_ratios().first());
//! #
//! # Ok::<(), mrc::Error>(())
//! ```
//!
//! For traces too large for exact tracking, sample:
//!
//! ```
//! use mrc::{FixedRateShards, TraceRunner};
//!
//! let mut estimator = FixedRateShards::new(0.01, 1 << 20, 1)?;
//!
//! let keys = (0..100_000u64).map(|i| i % 1_000);
//! let mrc = TraceRunner::new().run(&mut estimator, keys)?;
//! #
//! # Ok::<(), mrc::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

mod error;
mod estimator;
mod evicting_map;
mod hash;
mod histogram;
mod miss_rate_curve;
mod olken;
mod runner;

pub mod shards;
pub mod trace;

mod tree;

/// Cache access key, an opaque 64-bit identifier from the trace
///
/// Keys carry no ordering semantics beyond equality and hashability;
/// 0 is a valid key.
pub type Key = u64;

/// Logical access timestamp, a monotonically increasing counter
///
/// One timestamp is assigned per tracked access; the order-statistic tree
/// holds exactly one timestamp per currently live key.
pub type Timestamp = u64;

pub use {
    error::{Error, Result},
    estimator::{AnyEstimator, Estimator},
    evicting_map::EvictingMap,
    histogram::{Histogram, OutOfBoundsMode},
    miss_rate_curve::MissRateCurve,
    olken::Olken,
    runner::TraceRunner,
    shards::{FixedRateShards, FixedSizeShards},
    tree::OrderStatisticTree,
};
