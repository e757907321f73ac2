// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::histogram::OutOfBoundsMode;
use crate::tree::OrderStatisticTree;
use crate::{Estimator, Histogram, Key, Timestamp};
use rustc_hash::FxHashMap;

/// Exact reuse-distance estimator (Olken's algorithm)
///
/// Maintains the LRU stack as an order-statistic tree over access
/// timestamps plus a key → timestamp index. Every access to a previously
/// seen key counts the timestamps younger than its last access: the number
/// of distinct keys touched since, i.e. the stack distance. First sightings
/// count as cold misses.
///
/// Memory is O(unique keys), which makes this the oracle the sampling
/// estimators are measured against rather than something to run on traces
/// with billions of unique keys.
pub struct Olken {
    tree: OrderStatisticTree,
    key_index: FxHashMap<Key, Timestamp>,
    histogram: Histogram,
    current_timestamp: Timestamp,
}

impl Olken {
    /// Creates an Olken estimator over a histogram with `num_bins` bins of
    /// `bin_size` distances each.
    ///
    /// # Errors
    ///
    /// Returns error, if `num_bins` or `bin_size` is zero.
    pub fn new(num_bins: u64, bin_size: u64) -> crate::Result<Self> {
        Self::with_mode(num_bins, bin_size, OutOfBoundsMode::default())
    }

    /// Creates an Olken estimator with an explicit histogram out-of-bounds
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns error, if `num_bins` or `bin_size` is zero.
    pub fn with_mode(num_bins: u64, bin_size: u64, mode: OutOfBoundsMode) -> crate::Result<Self> {
        Ok(Self {
            tree: OrderStatisticTree::new(),
            key_index: FxHashMap::default(),
            histogram: Histogram::with_mode(num_bins, bin_size, mode)?,
            current_timestamp: 0,
        })
    }

    /// Returns the number of currently tracked (live) keys.
    #[must_use]
    pub fn tracked_len(&self) -> u64 {
        self.tree.len()
    }

    pub(crate) fn lookup(&self, key: Key) -> Option<Timestamp> {
        self.key_index.get(&key).copied()
    }

    /// Stack distance of the key last accessed at `timestamp`.
    pub(crate) fn stack_distance(&self, timestamp: Timestamp) -> u64 {
        self.tree.reverse_rank(timestamp)
    }

    /// Moves an already tracked key to the top of the stack.
    pub(crate) fn update_stack(&mut self, key: Key, old_timestamp: Timestamp) {
        self.tree.remove(old_timestamp);

        let fresh = self.next_timestamp();
        self.tree.insert(fresh);
        self.key_index.insert(key, fresh);
    }

    /// Pushes a previously unseen key onto the top of the stack.
    pub(crate) fn insert_stack(&mut self, key: Key) {
        let fresh = self.next_timestamp();
        self.tree.insert(fresh);
        self.key_index.insert(key, fresh);
    }

    /// Drops a tracked key without counting anything, used by the
    /// fixed-size sampler's eviction.
    pub(crate) fn remove_item(&mut self, key: Key) -> bool {
        let Some(timestamp) = self.key_index.remove(&key) else {
            return false;
        };

        self.tree.remove(timestamp)
    }

    pub(crate) fn histogram_mut(&mut self) -> &mut Histogram {
        &mut self.histogram
    }

    fn next_timestamp(&mut self) -> Timestamp {
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;
        timestamp
    }
}

impl Estimator for Olken {
    fn access(&mut self, key: Key) -> crate::Result<()> {
        match self.lookup(key) {
            Some(old_timestamp) => {
                let distance = self.stack_distance(old_timestamp);
                self.histogram.insert_finite(distance);
                self.update_stack(key, old_timestamp);
            }
            None => {
                self.histogram.insert_infinite();
                self.insert_stack(key);
            }
        }

        Ok(())
    }

    fn post_process(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn histogram(&self) -> &Histogram {
        &self.histogram
    }
}
