//! Splits: prepare bottom-up, then commit.
//!
//! # Key Invariant
//!
//! No published node is modified until every lock the split needs is held.
//!
//! ```text
//! prepare (may restart):                  commit (cannot fail):
//!   leaf locked, sibling built              link sibling into parent / new root
//!   parent upgraded, full? build sibling    truncate every split node
//!   grandparent upgraded, ...               apply deferred left-side inserts
//!   ancestor with room, or root CAS         publish siblings, unlock all
//! ```
//!
//! Siblings are built as [`Unpublished`] copies of the upper halves while
//! the existing nodes stay intact and write-locked. If an ancestor upgrade fails
//! (its version moved since the descent), the `?` drops every guard
//! (unlocking with a version bump) and frees every unpublished sibling.
//! Nothing reachable was changed, so the restart loses no entry.
//!
//! # Module Organization
//!
//! - [`propagation`]: the prepare loop and the commit
//! - [`root_creation`]: root replacement under the growth lock

use crate::alloc::Unpublished;
use crate::internode::InternodeNode;
use crate::latch::WriteGuard;
use crate::leaf::LeafNode;
use crate::node::{Key, NodePtr, Payload};

mod propagation;
mod root_creation;

/// A full internode whose split is prepared but not committed.
struct InnerSplit<'t, const INNER_WIDTH: usize> {
    node: &'t InternodeNode<INNER_WIDTH>,
    guard: WriteGuard<'t>,
    /// Separators the node keeps at commit.
    keep: usize,
    sibling: Unpublished<InternodeNode<INNER_WIDTH>>,
    /// Separator and right child from the level below, if they belong in
    /// the left half. Inserted after truncation.
    deferred: Option<(Key, NodePtr)>,
}

/// Every lock and unpublished node held by one split in progress.
struct SplitChain<'t, const LEAF_WIDTH: usize, const INNER_WIDTH: usize> {
    leaf: &'t LeafNode<LEAF_WIDTH>,
    leaf_guard: WriteGuard<'t>,
    leaf_keep: usize,
    leaf_sibling: Unpublished<LeafNode<LEAF_WIDTH>>,
    /// The entry being upserted, if it belongs in the left leaf.
    deferred_entry: Option<(Key, Payload)>,

    /// Split internodes, bottom-up.
    inners: Vec<InnerSplit<'t, INNER_WIDTH>>,

    /// Separator waiting to be linked one level up.
    separator: Key,
    /// Node to the left of `separator` at the current top of the chain.
    left: NodePtr,
    /// Node to the right of `separator` (always unpublished).
    right: NodePtr,
}

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> SplitChain<'_, LEAF_WIDTH, INNER_WIDTH> {
    /// Unpublished nodes freed if this chain is abandoned.
    fn unpublished_count(&self) -> u64 {
        1 + self.inners.len() as u64
    }
}

/// Where the separator at the top of the chain gets linked.
enum SplitTarget<'t, const INNER_WIDTH: usize> {
    /// An ancestor with room, write-locked.
    Parent {
        node: &'t InternodeNode<INNER_WIDTH>,
        guard: WriteGuard<'t>,
    },
    /// A new root was installed above the chain.
    NewRoot,
}
