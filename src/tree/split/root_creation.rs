//! Root replacement.
//!
//! # CAS Failure Policy
//!
//! The new root is unpublished until the CAS succeeds. If another thread
//! replaced the root first, the new root is freed on the spot (its children
//! are not touched) and the split restarts.

use parking_lot::MutexGuard;

use crate::alloc::Unpublished;
use crate::internode::InternodeNode;
use crate::node::{Key, NodePtr};
use crate::ordering::{COUNTER, ROOT_SWAP_FAILURE, ROOT_SWAP_SUCCESS};
use crate::tracing_helpers::{debug_log, warn_log};
use crate::tree::{Abort, BTreeGeneric};

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> BTreeGeneric<LEAF_WIDTH, INNER_WIDTH> {
    /// Install a root with one separator above `left` and `right`.
    ///
    /// `left` must be the current root; `_growth` proves the growth lock is
    /// held. On success the tree is one level taller.
    ///
    /// # Errors
    /// - `Abort::Restart` if the root is no longer `left`.
    /// - `Abort::Fatal` if the root node cannot be allocated.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, _growth))
    )]
    pub(super) fn make_root(
        &self,
        _growth: &MutexGuard<'_, ()>,
        separator: Key,
        left: NodePtr,
        right: NodePtr,
    ) -> Result<(), Abort> {
        let root: Unpublished<InternodeNode<INNER_WIDTH>> =
            InternodeNode::new_root(separator, left, right)?;
        let new_root: NodePtr = root.node_ptr();

        match self
            .root
            .compare_exchange(left, new_root, ROOT_SWAP_SUCCESS, ROOT_SWAP_FAILURE)
        {
            Ok(_) => {
                root.publish();
                self.height.fetch_add(1, COUNTER);
                self.counters.record_root_growth();

                debug_log!(new_root = ?new_root, height = self.height(), "root grew");
                Ok(())
            }

            Err(_) => {
                warn_log!(expected = ?left, "root changed, discarding new root");
                self.counters.record_discarded(1);
                Err(Abort::Restart)
            }
        }
    }
}
