//! Leaf node: sorted `(key, payload)` pairs.
//!
//! Keys are kept physically sorted (no permutation array), so an insert
//! shifts the tail of both arrays right by one. Writers hold the node's
//! [`WriteGuard`]; optimistic readers may observe a half-shifted array and
//! rely on the version check afterwards to discard what they read.
//!
//! # Memory Layout (WIDTH = 255)
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ header: NodeHeader (16 bytes)                │
//! ├──────────────────────────────────────────────┤
//! │ keys: [AtomicU64; 255] (2040 bytes)          │
//! ├──────────────────────────────────────────────┤
//! │ payloads: [AtomicU64; 255] (2040 bytes)      │
//! └──────────────────────────────────────────────┘
//! Total: 4096 bytes
//! ```
//!
//! # Split
//!
//! A full leaf with `n` entries keeps its lower `n / 2` entries; the upper
//! half moves to a new right sibling whose first key becomes the separator.
//! The separator stays in the sibling, so it is duplicated in the parent.

use std::fmt as StdFmt;
use std::sync::atomic::AtomicU64;

use crate::alloc::{Unpublished, ZeroedNode};
use crate::ksearch;
use crate::latch::{OptLatch, WriteGuard};
use crate::node::{Key, LEAF_CAPACITY, NodeHeader, NodeKind, Payload};
use crate::ordering::{DATA_LOAD, DATA_STORE};
use crate::tree::TreeError;

/// Outcome of inserting into a leaf that has room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum LeafInsert {
    /// The key was absent; the entry count grew by one.
    Inserted,
    /// The key was present; its payload was overwritten.
    Updated,
}

/// Leaf node with room for `WIDTH` entries.
#[repr(C)]
pub struct LeafNode<const WIDTH: usize = LEAF_CAPACITY> {
    header: NodeHeader,
    keys: [AtomicU64; WIDTH],
    payloads: [AtomicU64; WIDTH],
}

// SAFETY: `#[repr(C)]` with the header first; zero is a valid bit pattern
// for atomics and for `NodeKind::Leaf`.
unsafe impl<const WIDTH: usize> ZeroedNode for LeafNode<WIDTH> {
    const KIND: NodeKind = NodeKind::Leaf;
}

impl<const WIDTH: usize> LeafNode<WIDTH> {
    // ========================================================================
    //  Reads (safe under an optimistic read lock)
    // ========================================================================

    /// The node header.
    #[inline(always)]
    #[must_use]
    pub const fn header(&self) -> &NodeHeader {
        &self.header
    }

    /// The node latch.
    #[inline(always)]
    #[must_use]
    pub const fn latch(&self) -> &OptLatch {
        self.header.latch()
    }

    /// Number of entries, clamped to `WIDTH`.
    ///
    /// A racing reader may see a torn count; clamping keeps indexing in
    /// bounds until the version check rejects the read.
    #[inline(always)]
    #[must_use]
    pub fn count(&self) -> usize {
        self.header.count().min(WIDTH)
    }

    /// Whether the leaf holds `WIDTH` entries.
    #[inline(always)]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count() >= WIDTH
    }

    /// Key at slot `i`, or `0` for an out-of-range slot.
    #[inline(always)]
    #[must_use]
    pub fn key(&self, i: usize) -> Key {
        self.keys.get(i).map_or(0, |k| k.load(DATA_LOAD))
    }

    /// Payload at slot `i`, or `0` for an out-of-range slot.
    #[inline(always)]
    #[must_use]
    pub fn payload(&self, i: usize) -> Payload {
        self.payloads.get(i).map_or(0, |p| p.load(DATA_LOAD))
    }

    /// Slot of `key` (`Ok`) or the slot it would be inserted at (`Err`).
    #[inline]
    pub fn find(&self, key: Key) -> Result<usize, usize> {
        let n: usize = self.count();
        let pos: usize = ksearch::lower_bound(n, key, |i| self.key(i));

        if pos < n && self.key(pos) == key {
            Ok(pos)
        } else {
            Err(pos)
        }
    }

    /// Payload stored under `key`, if present.
    ///
    /// Under an optimistic read the answer is only meaningful once the
    /// caller has validated the leaf's version.
    #[inline]
    #[must_use]
    pub fn search(&self, key: Key) -> Option<Payload> {
        self.find(key).ok().map(|pos| self.payload(pos))
    }

    /// Copy of the live keys, in slot order.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        (0..self.count()).map(|i| self.key(i)).collect()
    }

    // ========================================================================
    //  Writes (lock held, or node unpublished)
    // ========================================================================

    /// Insert or overwrite `key`.
    ///
    /// The leaf must not be full unless `key` is already present.
    pub(crate) fn insert(&self, guard: &WriteGuard<'_>, key: Key, payload: Payload) -> LeafInsert {
        debug_assert!(guard.guards(self.latch()), "insert: guard for another node");
        self.insert_entry(key, payload)
    }

    /// [`insert`](Self::insert) for a node no other thread can reach.
    pub(crate) fn insert_exclusive(&mut self, key: Key, payload: Payload) -> LeafInsert {
        self.insert_entry(key, payload)
    }

    fn insert_entry(&self, key: Key, payload: Payload) -> LeafInsert {
        let n: usize = self.count();

        let pos: usize = match self.find(key) {
            Ok(pos) => {
                self.payloads[pos].store(payload, DATA_STORE);
                return LeafInsert::Updated;
            }
            Err(pos) => pos,
        };

        debug_assert!(n < WIDTH, "insert_entry: leaf is full");

        for i in (pos..n).rev() {
            self.keys[i + 1].store(self.keys[i].load(DATA_LOAD), DATA_STORE);
            self.payloads[i + 1].store(self.payloads[i].load(DATA_LOAD), DATA_STORE);
        }

        self.keys[pos].store(key, DATA_STORE);
        self.payloads[pos].store(payload, DATA_STORE);
        self.header.set_count(n + 1);

        LeafInsert::Inserted
    }

    /// Drop every entry at slot `len` and above.
    pub(crate) fn truncate(&self, guard: &WriteGuard<'_>, len: usize) {
        debug_assert!(guard.guards(self.latch()), "truncate: guard for another node");
        debug_assert!(len <= self.count(), "truncate: cannot grow");

        self.header.set_count(len);
    }

    /// Copy the upper half into a new, unpublished right sibling.
    ///
    /// `self` is left untouched so the split can still be abandoned.
    /// Returns `(separator, keep, sibling)`: committing the split means
    /// linking `sibling` under `separator` and truncating `self` to `keep`.
    pub(crate) fn split_upper(
        &self,
        guard: &WriteGuard<'_>,
    ) -> Result<(Key, usize, Unpublished<Self>), TreeError> {
        debug_assert!(guard.guards(self.latch()), "split_upper: guard for another node");

        let n: usize = self.count();
        let keep: usize = n / 2;
        debug_assert!(keep > 0 && keep < n, "split_upper: too few entries");

        let sibling: Unpublished<Self> = Unpublished::try_new()?;

        for (dst, src) in (keep..n).enumerate() {
            sibling.keys[dst].store(self.keys[src].load(DATA_LOAD), DATA_STORE);
            sibling.payloads[dst].store(self.payloads[src].load(DATA_LOAD), DATA_STORE);
        }
        sibling.header.set_count(n - keep);

        Ok((self.key(keep), keep, sibling))
    }
}

impl<const WIDTH: usize> StdFmt::Debug for LeafNode<WIDTH> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("LeafNode")
            .field("latch", self.latch())
            .field("keys", &self.keys())
            .finish()
    }
}
