//! Internode (inner node): separator keys and child pointers.
//!
//! # Routing Model
//!
//! ```text
//!         [K0 | K1 | K2]           <- Internode (3 keys, 4 children)
//!        /    |    |    \
//!    C0     C1    C2     C3        <- Children
//!
//!    C0: keys < K0
//!    C1: keys >= K0 and < K1
//!    C2: keys >= K1 and < K2
//!    C3: keys >= K2
//! ```
//!
//! A key equal to a separator routes right, matching the leaf split which
//! keeps the separator as the sibling's first key.
//!
//! # Memory Layout (WIDTH = 254)
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │ header: NodeHeader (16 bytes)                    │
//! ├──────────────────────────────────────────────────┤
//! │ keys: [AtomicU64; 254] (2032 bytes)              │
//! ├──────────────────────────────────────────────────┤
//! │ children: [AtomicPtr; 254] (2032 bytes)          │
//! ├──────────────────────────────────────────────────┤
//! │ rightmost_child: AtomicPtr (8 bytes)             │
//! └──────────────────────────────────────────────────┘
//! Total: 4088 bytes
//! ```
//!
//! A full node has `WIDTH + 1` children; child `WIDTH` lives in
//! `rightmost_child` because array lengths cannot be `WIDTH + 1`.

use std::fmt as StdFmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64};

use crate::alloc::{Unpublished, ZeroedNode};
use crate::ksearch;
use crate::latch::{OptLatch, WriteGuard};
use crate::node::{INNER_CAPACITY, Key, NodeHeader, NodeKind, NodePtr};
use crate::ordering::{DATA_LOAD, DATA_STORE};
use crate::tree::TreeError;

/// Inner node with room for `WIDTH` separators and `WIDTH + 1` children.
#[repr(C)]
pub struct InternodeNode<const WIDTH: usize = INNER_CAPACITY> {
    header: NodeHeader,
    keys: [AtomicU64; WIDTH],
    children: [AtomicPtr<NodeHeader>; WIDTH],
    rightmost_child: AtomicPtr<NodeHeader>,
}

// SAFETY: `#[repr(C)]` with the header first; zero is a valid bit pattern
// for atomics (null pointers) and the header kind is rewritten on allocation.
unsafe impl<const WIDTH: usize> ZeroedNode for InternodeNode<WIDTH> {
    const KIND: NodeKind = NodeKind::Inner;
}

impl<const WIDTH: usize> InternodeNode<WIDTH> {
    /// Allocate a root with one separator and two children.
    ///
    /// Every key in `left` is `< separator`, every key in `right` is `>=`.
    pub(crate) fn new_root(
        separator: Key,
        left: NodePtr,
        right: NodePtr,
    ) -> Result<Unpublished<Self>, TreeError> {
        let root: Unpublished<Self> = Unpublished::try_new()?;

        root.keys[0].store(separator, DATA_STORE);
        root.set_child(0, left);
        root.set_child(1, right);
        root.header.set_count(1);

        Ok(root)
    }

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

    /// Number of separator keys, clamped to `WIDTH`.
    #[inline(always)]
    #[must_use]
    pub fn count(&self) -> usize {
        self.header.count().min(WIDTH)
    }

    /// Whether no further separator fits.
    #[inline(always)]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count() >= WIDTH
    }

    /// Separator at slot `i`, or `0` for an out-of-range slot.
    #[inline(always)]
    #[must_use]
    pub fn key(&self, i: usize) -> Key {
        self.keys.get(i).map_or(0, |k| k.load(DATA_LOAD))
    }

    /// Child pointer at index `i` (`0..=WIDTH`).
    ///
    /// Index `WIDTH` reads the rightmost child. Any larger index yields
    /// null, which traversal treats as a restart.
    #[inline(always)]
    #[must_use]
    pub fn child(&self, i: usize) -> NodePtr {
        match self.children.get(i) {
            Some(slot) => slot.load(DATA_LOAD),
            None if i == WIDTH => self.rightmost_child.load(DATA_LOAD),
            None => ptr::null_mut(),
        }
    }

    /// Index of the child whose range contains `key`.
    #[inline]
    #[must_use]
    pub fn route(&self, key: Key) -> usize {
        ksearch::upper_bound(self.count(), key, |i| self.key(i))
    }

    /// Copy of the live separators, in slot order.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        (0..self.count()).map(|i| self.key(i)).collect()
    }

    // ========================================================================
    //  Writes (lock held, or node unpublished)
    // ========================================================================

    #[inline(always)]
    fn set_child(&self, i: usize, child: NodePtr) {
        debug_assert!(i <= WIDTH, "set_child: index out of bounds");

        match self.children.get(i) {
            Some(slot) => slot.store(child, DATA_STORE),
            None => self.rightmost_child.store(child, DATA_STORE),
        }
    }

    /// Insert `separator` with `right` as the child to its right.
    ///
    /// Keys at and after the insert position shift right by one, together
    /// with the children to their right. The node must not be full.
    pub(crate) fn insert(&self, guard: &WriteGuard<'_>, separator: Key, right: NodePtr) {
        debug_assert!(guard.guards(self.latch()), "insert: guard for another node");
        self.insert_entry(separator, right);
    }

    /// [`insert`](Self::insert) for a node no other thread can reach.
    pub(crate) fn insert_exclusive(&mut self, separator: Key, right: NodePtr) {
        self.insert_entry(separator, right);
    }

    fn insert_entry(&self, separator: Key, right: NodePtr) {
        let n: usize = self.count();
        debug_assert!(n < WIDTH, "insert_entry: node is full");

        let pos: usize = ksearch::lower_bound(n, separator, |i| self.key(i));

        // keys[pos..n] -> keys[pos+1..n+1], children[pos+1..=n] -> children[pos+2..=n+1]
        for i in (pos..n).rev() {
            self.keys[i + 1].store(self.keys[i].load(DATA_LOAD), DATA_STORE);
            self.set_child(i + 2, self.child(i + 1));
        }

        self.keys[pos].store(separator, DATA_STORE);
        self.set_child(pos + 1, right);
        self.header.set_count(n + 1);
    }

    /// Drop every separator at slot `len` and above (and the children to
    /// their right).
    pub(crate) fn truncate(&self, guard: &WriteGuard<'_>, len: usize) {
        debug_assert!(guard.guards(self.latch()), "truncate: guard for another node");
        debug_assert!(len <= self.count(), "truncate: cannot grow");

        self.header.set_count(len);
    }

    /// Copy the upper half into a new, unpublished right sibling.
    ///
    /// With `n` separators and `mid = n / 2`, the sibling receives
    /// `keys[mid + 1..n]` and `children[mid + 1..=n]`, and `keys[mid]` is
    /// promoted (present in neither half). `self` is left untouched.
    /// Returns `(promoted, keep, sibling)` with `keep == mid`.
    pub(crate) fn split_upper(
        &self,
        guard: &WriteGuard<'_>,
    ) -> Result<(Key, usize, Unpublished<Self>), TreeError> {
        debug_assert!(guard.guards(self.latch()), "split_upper: guard for another node");

        let n: usize = self.count();
        let mid: usize = n / 2;
        debug_assert!(mid > 0, "split_upper: too few separators");

        let sibling: Unpublished<Self> = Unpublished::try_new()?;

        for (dst, src) in (mid + 1..n).enumerate() {
            sibling.keys[dst].store(self.keys[src].load(DATA_LOAD), DATA_STORE);
        }
        for (dst, src) in (mid + 1..=n).enumerate() {
            sibling.set_child(dst, self.child(src));
        }
        sibling.header.set_count(n - mid - 1);

        Ok((self.key(mid), mid, sibling))
    }
}

impl<const WIDTH: usize> StdFmt::Debug for InternodeNode<WIDTH> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("InternodeNode")
            .field("latch", self.latch())
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "fail fast in tests")]
mod tests {
    use super::*;

    type Inode4 = InternodeNode<4>;

    /// Distinct fake child pointers; never dereferenced.
    fn fake(n: usize) -> NodePtr {
        ptr::without_provenance_mut(n * 64)
    }

    fn lock(inode: &Inode4) -> WriteGuard<'_> {
        let v: u64 = inode.latch().read_lock_or_restart().unwrap();
        inode.latch().upgrade_to_write_lock_or_restart(v).unwrap()
    }

    /// Node with separators `10, 20, .., 10 * n` and children `fake(0..=n)`.
    fn filled(n: usize) -> Unpublished<Inode4> {
        let root: Unpublished<Inode4> = InternodeNode::new_root(10, fake(0), fake(1)).unwrap();
        let guard = lock(&root);
        for i in 2..=n {
            root.insert(&guard, (i as Key) * 10, fake(i));
        }
        drop(guard);
        root
    }

    #[test]
    fn test_production_internode_fits_page() {
        assert!(size_of::<InternodeNode>() <= crate::node::PAGE_SIZE);
        assert_eq!(size_of::<InternodeNode>(), 4088);
    }

    #[test]
    fn test_new_root() {
        let root = filled(1);

        assert_eq!(root.count(), 1);
        assert_eq!(root.keys(), vec![10]);
        assert_eq!(root.child(0), fake(0));
        assert_eq!(root.child(1), fake(1));
    }

    #[test]
    fn test_route_equal_key_goes_right() {
        let root = filled(3);

        assert_eq!(root.route(5), 0);
        assert_eq!(root.route(10), 1);
        assert_eq!(root.route(19), 1);
        assert_eq!(root.route(20), 2);
        assert_eq!(root.route(30), 3);
        assert_eq!(root.route(u64::MAX), 3);
    }

    #[test]
    fn test_insert_in_middle_shifts_children() {
        let root: Unpublished<Inode4> = InternodeNode::new_root(10, fake(0), fake(1)).unwrap();
        let guard = lock(&root);
        root.insert(&guard, 30, fake(3));
        root.insert(&guard, 20, fake(2));

        assert_eq!(root.keys(), vec![10, 20, 30]);
        for i in 0..=3 {
            assert_eq!(root.child(i), fake(i));
        }
    }

    #[test]
    fn test_full_node_uses_rightmost_child() {
        let root = filled(4);

        assert!(root.is_full());
        assert_eq!(root.child(4), fake(4));
        assert!(root.child(5).is_null());
    }

    #[test]
    fn test_split_upper_promotes_middle() {
        let root = filled(4);
        let guard = lock(&root);

        let (promoted, keep, sibling) = root.split_upper(&guard).unwrap();

        // [10, 20 | 30 | 40]
        assert_eq!(promoted, 30);
        assert_eq!(keep, 2);
        assert_eq!(sibling.keys(), vec![40]);
        assert_eq!(sibling.child(0), fake(3));
        assert_eq!(sibling.child(1), fake(4));
        assert_eq!(root.count(), 4);

        root.truncate(&guard, keep);
        assert_eq!(root.keys(), vec![10, 20]);
        assert_eq!(root.child(2), fake(2));
    }

    #[test]
    fn test_split_then_insert_into_sibling() {
        let root = filled(4);
        let guard = lock(&root);
        let (_, _, mut sibling) = root.split_upper(&guard).unwrap();

        sibling.insert_exclusive(35, fake(9));

        assert_eq!(sibling.keys(), vec![35, 40]);
        assert_eq!(sibling.child(0), fake(3));
        assert_eq!(sibling.child(1), fake(9));
        assert_eq!(sibling.child(2), fake(4));
    }
}
