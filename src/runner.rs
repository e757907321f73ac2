// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{Estimator, Key, MissRateCurve};
use std::path::PathBuf;
use std::time::Instant;

const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Generic trace driver
///
/// Feeds a key stream into an estimator, finalizes it, derives the miss
/// ratio curve and optionally persists both artifacts. Per-access failures
/// are counted and reported in aggregate; the hot loop never logs.
///
/// Artifact I/O failures are logged as warnings and do not fail the run.
pub struct TraceRunner {
    histogram_path: Option<PathBuf>,
    mrc_path: Option<PathBuf>,
}

impl TraceRunner {
    /// Creates a runner that keeps its artifacts in memory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            histogram_path: None,
            mrc_path: None,
        }
    }

    /// Persists the sparse histogram to the given path after the run.
    #[must_use]
    pub fn histogram_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.histogram_path = Some(path.into());
        self
    }

    /// Persists the packed miss ratio curve to the given path after the run.
    #[must_use]
    pub fn mrc_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.mrc_path = Some(path.into());
        self
    }

    /// Runs the estimator over the key stream and returns the miss ratio
    /// curve.
    ///
    /// A failing [`Estimator::post_process`] is logged; the run still
    /// completes with the unadjusted histogram.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; kept fallible for driver glue that
    /// wants to surface future failure modes.
    pub fn run<E: Estimator>(
        &self,
        estimator: &mut E,
        keys: impl IntoIterator<Item = Key>,
    ) -> crate::Result<MissRateCurve> {
        let start = Instant::now();
        let mut processed: u64 = 0;
        let mut failed: u64 = 0;

        for key in keys {
            if estimator.access(key).is_err() {
                failed += 1;
            }

            processed += 1;
            if processed % PROGRESS_INTERVAL == 0 {
                log::trace!("processed {processed} accesses");
            }
        }

        let access_time = start.elapsed();

        if failed > 0 {
            log::warn!("{failed} of {processed} accesses failed");
        }

        let start = Instant::now();
        if let Err(e) = estimator.post_process() {
            log::error!("post-processing failed: {e}");
        }
        let post_process_time = start.elapsed();

        let start = Instant::now();
        let histogram = estimator.histogram();
        debug_assert!(histogram.validate());

        let mrc = MissRateCurve::from_histogram(histogram);
        let mrc_time = start.elapsed();

        log::info!(
            "{processed} accesses in {access_time:?} | post-process: {post_process_time:?} | MRC: {mrc_time:?}",
        );

        if let Some(path) = &self.histogram_path {
            if let Err(e) = histogram.save_sparse(path) {
                log::warn!("failed to save histogram to {path:?}: {e}");
            }
        }

        if let Some(path) = &self.mrc_path {
            if let Err(e) = mrc.save(path) {
                log::warn!("failed to save MRC to {path:?}: {e}");
            }
        }

        Ok(mrc)
    }
}

impl Default for TraceRunner {
    fn default() -> Self {
        Self::new()
    }
}
