//! The concurrent B+tree handle.
//!
//! [`BTreeGeneric`] owns the root pointer, the height counter and the
//! growth lock. Operations live in submodules:
//!
//! - `optimistic`: root-to-leaf descent with coupled version checks,
//!   and `lookup`
//! - `locked`: `upsert` (in-place insert or overwrite)
//! - `split`: leaf and internode splits, propagation, root growth
//! - `stats` / `verify`: counters and the quiescent structure check
//!
//! # Retry Model
//!
//! Every operation is a loop of attempts. An attempt returns
//! `Err(Abort::Restart)` as soon as any version check fails; the loop backs
//! off and starts again from the root. Only allocation failure
//! ([`TreeError`]) ends an operation early.

use std::alloc::{Layout, handle_alloc_error};
use std::error::Error as StdError;
use std::fmt as StdFmt;
use std::hint as StdHint;
use std::sync::atomic::{AtomicPtr, AtomicUsize};

use parking_lot::Mutex;

use crate::alloc::Unpublished;
use crate::alloc::reclaim::reclaim_subtree;
use crate::internode::InternodeNode;
use crate::latch::Restart;
use crate::leaf::LeafNode;
use crate::node::{INNER_CAPACITY, LEAF_CAPACITY, NodeHeader, PAGE_SIZE};
use crate::ordering::{COUNTER, ROOT_LOAD};

mod locked;
mod optimistic;
mod split;
mod stats;
mod verify;


pub use stats::TreeStats;
pub use verify::{InvariantViolation, TreeShape};

use stats::Counters;

/// Restarts between two `yield_now` calls in the retry loops.
///
/// Below this, a restart only issues a spin-loop hint.
pub const RESTART_YIELD_INTERVAL: u64 = 1000;

const _: () = assert!(size_of::<LeafNode>() <= PAGE_SIZE, "leaf exceeds page");
const _: () = assert!(size_of::<InternodeNode>() <= PAGE_SIZE, "internode exceeds page");

// ============================================================================
//  TreeError
// ============================================================================

/// Failures reported to callers of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// The allocator returned null for a node allocation.
    AllocationFailed {
        /// Size of the requested node.
        bytes: usize,
    },
}

impl StdFmt::Display for TreeError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::AllocationFailed { bytes } => {
                write!(f, "node allocation of {bytes} bytes failed")
            }
        }
    }
}

impl StdError for TreeError {}

// ============================================================================
//  Abort
// ============================================================================

/// Why an attempt stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Abort {
    /// A version check failed; retry from the root.
    Restart,
    /// Give up and report to the caller.
    Fatal(TreeError),
}

impl From<Restart> for Abort {
    #[inline]
    fn from(_: Restart) -> Self {
        Self::Restart
    }
}

impl From<TreeError> for Abort {
    #[inline]
    fn from(err: TreeError) -> Self {
        Self::Fatal(err)
    }
}

/// Pause after a failed attempt.
///
/// `restarts` counts failed attempts of the current operation.
#[inline]
fn backoff(restarts: &mut u64) {
    *restarts += 1;

    if restarts.is_multiple_of(RESTART_YIELD_INTERVAL) {
        std::thread::yield_now();
    } else {
        StdHint::spin_loop();
    }
}

// ============================================================================
//  BTreeGeneric
// ============================================================================

/// Concurrent B+tree over `u64` keys and payloads, with node widths as
/// const parameters.
///
/// Use [`OlcBTree`] for the page-sized production widths. Small widths
/// (e.g. `BTreeGeneric<4, 4>`) make splits and growth easy to exercise.
///
/// # Example
///
/// ```rust
/// use olc_btree::OlcBTree;
///
/// let tree = OlcBTree::new();
/// tree.upsert(7, 70).unwrap();
/// tree.upsert(7, 71).unwrap();
///
/// assert_eq!(tree.lookup(7), Some(71));
/// assert_eq!(tree.lookup(8), None);
/// assert_eq!(tree.len(), 1);
/// ```
pub struct BTreeGeneric<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> {
    /// Current root. Replaced only by a CAS under `growth_lock`.
    root: AtomicPtr<NodeHeader>,

    /// Levels from root to leaf (1 = the root is a leaf). Informational.
    height: AtomicUsize,

    /// Distinct keys inserted so far.
    len: AtomicUsize,

    /// Serializes root replacement.
    growth_lock: Mutex<()>,

    counters: Counters,
}

/// Tree with page-sized nodes ([`LEAF_CAPACITY`], [`INNER_CAPACITY`]).
pub type OlcBTree = BTreeGeneric<LEAF_CAPACITY, INNER_CAPACITY>;

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> BTreeGeneric<LEAF_WIDTH, INNER_WIDTH> {
    /// Compile-time check of the width parameters.
    ///
    /// Both widths must be at least 2 (a split leaves entries on both sides)
    /// and fit the header's `u16` count.
    const WIDTH_CHECK: () = {
        assert!(LEAF_WIDTH >= 2, "LEAF_WIDTH must be at least 2");
        assert!(INNER_WIDTH >= 2, "INNER_WIDTH must be at least 2");
        assert!(LEAF_WIDTH <= u16::MAX as usize, "LEAF_WIDTH exceeds u16");
        assert!(INNER_WIDTH <= u16::MAX as usize, "INNER_WIDTH exceeds u16");
    };

    /// Create an empty tree: a single empty leaf as root, height 1.
    ///
    /// # Panics
    /// Aborts through [`handle_alloc_error`] if the root leaf cannot be
    /// allocated, like `Box::new`. Use [`try_new`](Self::try_new) to get an
    /// error instead.
    #[must_use]
    pub fn new() -> Self {
        match Self::try_new() {
            Ok(tree) => tree,
            Err(TreeError::AllocationFailed { .. }) => {
                handle_alloc_error(Layout::new::<LeafNode<LEAF_WIDTH>>())
            }
        }
    }

    /// Create an empty tree, reporting allocation failure.
    ///
    /// # Errors
    /// [`TreeError::AllocationFailed`] if the root leaf cannot be allocated.
    pub fn try_new() -> Result<Self, TreeError> {
        let () = Self::WIDTH_CHECK;

        let root: Unpublished<LeafNode<LEAF_WIDTH>> = Unpublished::try_new()?;

        Ok(Self {
            root: AtomicPtr::new(root.publish()),
            height: AtomicUsize::new(1),
            len: AtomicUsize::new(0),
            growth_lock: Mutex::new(()),
            counters: Counters::default(),
        })
    }

    /// Number of levels from root to leaf, `1` for a single-leaf tree.
    ///
    /// Informational: it may lag a concurrent root growth.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height.load(COUNTER)
    }

    /// Number of distinct keys inserted.
    ///
    /// Exact once concurrent upserts have returned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(COUNTER)
    }

    /// Whether no key has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the operation counters.
    #[must_use]
    pub fn stats(&self) -> TreeStats {
        self.counters.snapshot()
    }

    #[inline(always)]
    fn load_root(&self) -> *mut NodeHeader {
        self.root.load(ROOT_LOAD)
    }
}

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> Default
    for BTreeGeneric<LEAF_WIDTH, INNER_WIDTH>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> StdFmt::Debug
    for BTreeGeneric<LEAF_WIDTH, INNER_WIDTH>
{
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("BTreeGeneric")
            .field("leaf_width", &LEAF_WIDTH)
            .field("inner_width", &INNER_WIDTH)
            .field("height", &self.height())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> Drop
    for BTreeGeneric<LEAF_WIDTH, INNER_WIDTH>
{
    fn drop(&mut self) {
        let root: *mut NodeHeader = *self.root.get_mut();

        // SAFETY: `&mut self` excludes every reader and writer. All nodes
        // reachable from the root were allocated with these widths, and
        // none is referenced after this point.
        unsafe { reclaim_subtree::<LEAF_WIDTH, INNER_WIDTH>(root) };
    }
}
