//! Allocation failure during construction and splits.
//!
//! A wrapping global allocator returns null for zeroed allocations of one
//! chosen size while armed on the current thread. With 4-wide nodes a leaf
//! is 80 bytes and an internode 88, so each test can fail exactly one kind
//! of node. Every failed upsert must leave the tree as it was.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::mem::size_of;

use olc_btree::internode::InternodeNode;
use olc_btree::leaf::LeafNode;
use olc_btree::{BTreeGeneric, TreeError, TreeShape};

type SmallTree = BTreeGeneric<4, 4>;

const LEAF_BYTES: usize = size_of::<LeafNode<4>>();
const INNER_BYTES: usize = size_of::<InternodeNode<4>>();

// ============================================================================
//  Failing allocator
// ============================================================================

thread_local! {
    /// Size of zeroed allocations to refuse on this thread (0 = none).
    static FAIL_SIZE: Cell<usize> = const { Cell::new(0) };
    /// Allocations refused on this thread.
    static REFUSED: Cell<usize> = const { Cell::new(0) };
}

struct FailingAlloc;

// SAFETY: forwards to `System`, except for returning null, which is a
// permitted allocation failure.
unsafe impl GlobalAlloc for FailingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller upholds the `GlobalAlloc` contract.
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if FAIL_SIZE.with(Cell::get) == layout.size() {
            REFUSED.with(|r| r.set(r.get() + 1));
            return std::ptr::null_mut();
        }
        // SAFETY: caller upholds the `GlobalAlloc` contract.
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: `ptr` came from `System` with this layout.
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: caller upholds the `GlobalAlloc` contract.
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static ALLOC: FailingAlloc = FailingAlloc;

/// Run `f` with zeroed allocations of `bytes` refused; returns the result
/// and how many allocations were refused.
fn refusing<T>(bytes: usize, f: impl FnOnce() -> T) -> (T, usize) {
    REFUSED.with(|r| r.set(0));
    FAIL_SIZE.with(|s| s.set(bytes));
    let out = f();
    FAIL_SIZE.with(|s| s.set(0));
    (out, REFUSED.with(Cell::get))
}

fn shape(tree: &SmallTree) -> TreeShape {
    tree.verify().unwrap()
}

// ============================================================================
//  Tests
// ============================================================================

#[test]
fn node_sizes_are_distinct() {
    assert_eq!(LEAF_BYTES, 80);
    assert_eq!(INNER_BYTES, 88);
}

#[test]
fn try_new_reports_root_allocation_failure() {
    let (result, refused) = refusing(LEAF_BYTES, SmallTree::try_new);

    assert_eq!(refused, 1);
    assert_eq!(
        result.err(),
        Some(TreeError::AllocationFailed { bytes: LEAF_BYTES })
    );
    assert!(SmallTree::try_new().is_ok());
}

#[test]
fn failed_leaf_split_leaves_tree_unchanged() {
    let tree = SmallTree::new();
    for k in [10, 20, 30, 40] {
        tree.upsert(k, k).unwrap();
    }
    let before = shape(&tree);

    let (result, refused) = refusing(LEAF_BYTES, || tree.upsert(50, 50));

    assert_eq!(refused, 1);
    assert_eq!(result, Err(TreeError::AllocationFailed { bytes: LEAF_BYTES }));
    assert_eq!(shape(&tree), before);
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.lookup(50), None);
    assert_eq!(tree.stats().leaf_splits, 0);

    // Overwrites need no allocation.
    let (result, refused) = refusing(LEAF_BYTES, || tree.upsert(20, 21));
    assert_eq!(refused, 0);
    assert_eq!(result, Ok(()));

    tree.upsert(50, 50).unwrap();
    assert_eq!(tree.lookup(50), Some(50));
    assert_eq!(tree.lookup(20), Some(21));
    assert_eq!(shape(&tree).leaves, vec![vec![10, 20], vec![30, 40, 50]]);
}

#[test]
fn failed_new_root_leaves_tree_unchanged() {
    let tree = SmallTree::new();
    for k in [10, 20, 30, 40] {
        tree.upsert(k, k).unwrap();
    }
    let before = shape(&tree);

    // The leaf sibling is allocated; the root above it is not.
    let (result, refused) = refusing(INNER_BYTES, || tree.upsert(50, 50));

    assert_eq!(refused, 1);
    assert_eq!(result, Err(TreeError::AllocationFailed { bytes: INNER_BYTES }));
    assert_eq!(shape(&tree), before);
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.lookup(50), None);
    assert_eq!(tree.stats().discarded_nodes, 1);
    assert_eq!(tree.stats().root_growths, 0);

    tree.upsert(50, 50).unwrap();
    assert_eq!(tree.height(), 2);
    assert_eq!(shape(&tree).root_separators, vec![30]);
}

#[test]
fn failed_inner_split_leaves_tree_unchanged() {
    let tree = SmallTree::new();
    // Root separators 2, 4, 6, 8 (full); last leaf [8, 9, 10, 11] (full).
    for k in 0..12u64 {
        tree.upsert(k, k).unwrap();
    }
    let before = shape(&tree);
    assert_eq!(before.root_separators, vec![2, 4, 6, 8]);
    assert_eq!(before.leaves.last().unwrap(), &vec![8, 9, 10, 11]);

    let (result, refused) = refusing(INNER_BYTES, || tree.upsert(12, 12));

    assert_eq!(refused, 1);
    assert_eq!(result, Err(TreeError::AllocationFailed { bytes: INNER_BYTES }));
    assert_eq!(shape(&tree), before);
    assert_eq!(tree.len(), 12);
    assert_eq!(tree.lookup(12), None);
    assert_eq!(tree.stats().inner_splits, 0);
    assert_eq!(tree.stats().discarded_nodes, 1);

    tree.upsert(12, 12).unwrap();
    let after = shape(&tree);
    assert_eq!(after.height, 3);
    assert_eq!(after.root_separators, vec![6]);
    assert_eq!(after.key_count(), 13);
    for k in 0..13u64 {
        assert_eq!(tree.lookup(k), Some(k));
    }
}
