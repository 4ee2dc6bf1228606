//! Teardown of published nodes.
//!
//! Published nodes are never unlinked while the tree is alive, so the only
//! reclamation point is the tree's `Drop`, which has exclusive access.

use crate::internode::InternodeNode;
use crate::leaf::LeafNode;
use crate::node::{NodeHeader, NodePtr};

/// Free every node reachable from `root`.
///
/// Iterative DFS: follows child pointers `0..=count` of each internode and
/// frees each node after collecting its children.
///
/// # Safety
///
/// - `root` must be null or the root of a tree built from
///   `LeafNode<LEAF_WIDTH>` and `InternodeNode<INNER_WIDTH>` allocations.
/// - No other thread may access the tree, and no node may be used after
///   this call.
pub(crate) unsafe fn reclaim_subtree<const LEAF_WIDTH: usize, const INNER_WIDTH: usize>(
    root: NodePtr,
) {
    let mut stack: Vec<NodePtr> = Vec::with_capacity(64);
    stack.push(root);

    while let Some(node) = stack.pop() {
        if node.is_null() {
            continue;
        }

        // SAFETY: every node begins with its header.
        let header: &NodeHeader = unsafe { &*node };

        if header.is_leaf() {
            // SAFETY: tagged leaf, allocated as LeafNode<LEAF_WIDTH>.
            unsafe { drop(Box::from_raw(node.cast::<LeafNode<LEAF_WIDTH>>())) };
        } else {
            // SAFETY: tagged internode, allocated as InternodeNode<INNER_WIDTH>.
            let inode: &InternodeNode<INNER_WIDTH> =
                unsafe { &*node.cast::<InternodeNode<INNER_WIDTH>>() };

            // Collect children BEFORE freeing the internode.
            stack.extend((0..=inode.count()).map(|i| inode.child(i)));

            // SAFETY: as above; `inode` is not used past this point.
            unsafe { drop(Box::from_raw(node.cast::<InternodeNode<INNER_WIDTH>>())) };
        }
    }
}
