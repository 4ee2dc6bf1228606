//! Operation counters.
//!
//! Relaxed atomics, updated once per completed operation (restarts) or per
//! structural change. A [`TreeStats`] snapshot taken while operations run
//! is not a consistent cut across fields.

use std::sync::atomic::AtomicU64;

use crate::ordering::COUNTER;

/// Point-in-time copy of a tree's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Failed lookup attempts.
    pub lookup_restarts: u64,
    /// Failed upsert attempts.
    pub upsert_restarts: u64,
    /// Committed leaf splits.
    pub leaf_splits: u64,
    /// Committed internode splits.
    pub inner_splits: u64,
    /// Successful root replacements.
    pub root_growths: u64,
    /// Unpublished nodes freed because their split was abandoned.
    pub discarded_nodes: u64,
}

#[derive(Debug, Default)]
pub(super) struct Counters {
    lookup_restarts: AtomicU64,
    upsert_restarts: AtomicU64,
    leaf_splits: AtomicU64,
    inner_splits: AtomicU64,
    root_growths: AtomicU64,
    discarded_nodes: AtomicU64,
}

impl Counters {
    #[inline]
    pub(super) fn record_lookup_restarts(&self, n: u64) {
        if n > 0 {
            self.lookup_restarts.fetch_add(n, COUNTER);
        }
    }

    #[inline]
    pub(super) fn record_upsert_restarts(&self, n: u64) {
        if n > 0 {
            self.upsert_restarts.fetch_add(n, COUNTER);
        }
    }

    pub(super) fn record_split(&self, inner_splits: u64) {
        self.leaf_splits.fetch_add(1, COUNTER);
        if inner_splits > 0 {
            self.inner_splits.fetch_add(inner_splits, COUNTER);
        }
    }

    pub(super) fn record_root_growth(&self) {
        self.root_growths.fetch_add(1, COUNTER);
    }

    pub(super) fn record_discarded(&self, nodes: u64) {
        self.discarded_nodes.fetch_add(nodes, COUNTER);
    }

    pub(super) fn snapshot(&self) -> TreeStats {
        TreeStats {
            lookup_restarts: self.lookup_restarts.load(COUNTER),
            upsert_restarts: self.upsert_restarts.load(COUNTER),
            leaf_splits: self.leaf_splits.load(COUNTER),
            inner_splits: self.inner_splits.load(COUNTER),
            root_growths: self.root_growths.load(COUNTER),
            discarded_nodes: self.discarded_nodes.load(COUNTER),
        }
    }
}
