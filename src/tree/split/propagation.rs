//! Split propagation: lock ancestors bottom-up, then commit.

use crate::latch::WriteGuard;
use crate::leaf::{LeafInsert, LeafNode};
use crate::node::{Key, NodeHeader, NodePtr, Payload};
use crate::ordering::COUNTER;
use crate::tracing_helpers::debug_log;
use crate::tree::optimistic::Ancestor;
use crate::tree::{Abort, BTreeGeneric};

use super::{InnerSplit, SplitChain, SplitTarget};

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> BTreeGeneric<LEAF_WIDTH, INNER_WIDTH> {
    /// Insert into a full, write-locked leaf by splitting it.
    ///
    /// `path` holds the internodes passed on the way down (top-down) with
    /// the versions they were read at. The key is known to be absent.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, leaf, leaf_guard, path), fields(depth = path.len()))
    )]
    pub(in crate::tree) fn split_and_insert<'t>(
        &'t self,
        leaf: &'t LeafNode<LEAF_WIDTH>,
        leaf_guard: WriteGuard<'t>,
        key: Key,
        payload: Payload,
        path: &mut Vec<Ancestor<'t, INNER_WIDTH>>,
    ) -> Result<(), Abort> {
        let (separator, leaf_keep, mut leaf_sibling) = leaf.split_upper(&leaf_guard)?;

        let deferred_entry: Option<(Key, Payload)> = if key >= separator {
            let inserted = leaf_sibling.insert_exclusive(key, payload);
            debug_assert_eq!(inserted, LeafInsert::Inserted);
            None
        } else {
            Some((key, payload))
        };

        let right: NodePtr = leaf_sibling.node_ptr();
        let mut chain = SplitChain {
            leaf,
            leaf_guard,
            leaf_keep,
            leaf_sibling,
            deferred_entry,
            inners: Vec::new(),
            separator,
            left: std::ptr::from_ref(leaf).cast::<NodeHeader>().cast_mut(),
            right,
        };

        match self.lock_ancestors(&mut chain, path) {
            Ok(target) => {
                self.commit(chain, target);
                Ok(())
            }

            Err(abort) => {
                debug_log!(
                    nodes = chain.unpublished_count(),
                    "split abandoned, discarding siblings"
                );
                self.counters.record_discarded(chain.unpublished_count());
                Err(abort)
            }
        }
    }

    /// Walk `path` bottom-up, upgrading each ancestor and preparing a split
    /// for each full one, until an ancestor has room or the root is
    /// replaced.
    fn lock_ancestors<'t>(
        &'t self,
        chain: &mut SplitChain<'t, LEAF_WIDTH, INNER_WIDTH>,
        path: &mut Vec<Ancestor<'t, INNER_WIDTH>>,
    ) -> Result<SplitTarget<'t, INNER_WIDTH>, Abort> {
        while let Some((node, version)) = path.pop() {
            let guard: WriteGuard<'t> = node.latch().upgrade_to_write_lock_or_restart(version)?;

            if !node.is_full() {
                return Ok(SplitTarget::Parent { node, guard });
            }

            let (promoted, keep, mut sibling) = node.split_upper(&guard)?;

            let deferred: Option<(Key, NodePtr)> = if chain.separator >= promoted {
                sibling.insert_exclusive(chain.separator, chain.right);
                None
            } else {
                Some((chain.separator, chain.right))
            };

            chain.separator = promoted;
            chain.left = std::ptr::from_ref(node).cast::<NodeHeader>().cast_mut();
            chain.right = sibling.node_ptr();
            chain.inners.push(InnerSplit {
                node,
                guard,
                keep,
                sibling,
                deferred,
            });
        }

        // The chain reached the node the descent started from.
        let growth = self.growth_lock.lock();
        self.make_root(&growth, chain.separator, chain.left, chain.right)?;

        Ok(SplitTarget::NewRoot)
    }

    /// Apply a fully locked split. Cannot fail.
    fn commit(
        &self,
        chain: SplitChain<'_, LEAF_WIDTH, INNER_WIDTH>,
        target: SplitTarget<'_, INNER_WIDTH>,
    ) {
        let SplitChain {
            leaf,
            leaf_guard,
            leaf_keep,
            leaf_sibling,
            deferred_entry,
            inners,
            separator,
            right,
            ..
        } = chain;

        if let SplitTarget::Parent { node, guard } = &target {
            node.insert(guard, separator, right);
        }

        let inner_splits: u64 = inners.len() as u64;

        for split in inners {
            let InnerSplit {
                node,
                guard,
                keep,
                sibling,
                deferred,
            } = split;

            node.truncate(&guard, keep);
            if let Some((sep, child)) = deferred {
                node.insert(&guard, sep, child);
            }

            sibling.publish();
            drop(guard);
        }

        leaf.truncate(&leaf_guard, leaf_keep);
        if let Some((key, payload)) = deferred_entry {
            let inserted = leaf.insert(&leaf_guard, key, payload);
            debug_assert_eq!(inserted, LeafInsert::Inserted);
        }

        leaf_sibling.publish();

        self.len.fetch_add(1, COUNTER);
        self.counters.record_split(inner_splits);

        debug_log!(separator, inner_splits, "split committed");

        drop(leaf_guard);
        drop(target);
    }
}
