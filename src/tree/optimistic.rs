//! Optimistic descent and lookup.
//!
//! # Protocol
//!
//! ```text
//! 1. node = root; v = node.read_lock(); root unchanged? else restart
//! 2. while node is an internode:
//!      child = node.child(route(key))
//!      node.check(v)                    <- coupling step, before deref
//!      cv = child.read_lock()
//!      node.check(v)                    <- child not split in between
//!      node, v = child, cv
//! 3. read the leaf, then leaf.check(v)
//! ```
//!
//! No lock is ever taken. Any failed check restarts from the root.
//! Nodes are never freed while the tree lives, so a stale pointer that
//! passed step 2's coupling check is still safe to dereference.

use crate::internode::InternodeNode;
use crate::latch::Restart;
use crate::leaf::LeafNode;
use crate::node::{Key, NodeHeader, NodePtr, Payload};
use crate::tracing_helpers::trace_log;

use super::{BTreeGeneric, backoff};

/// An internode passed on the way down, with the version it was read at.
pub(super) type Ancestor<'t, const INNER_WIDTH: usize> = (&'t InternodeNode<INNER_WIDTH>, u64);

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> BTreeGeneric<LEAF_WIDTH, INNER_WIDTH> {
    /// Payload stored under `key`, or `None` if the key was never inserted.
    ///
    /// Never blocks and never writes shared memory (apart from counters).
    /// Retries internally until it observes a consistent leaf.
    #[must_use]
    pub fn lookup(&self, key: Key) -> Option<Payload> {
        let mut restarts: u64 = 0;

        loop {
            match self.lookup_attempt(key) {
                Ok(found) => {
                    self.counters.record_lookup_restarts(restarts);
                    return found;
                }

                Err(Restart) => {
                    trace_log!(key, restarts, "lookup restart");
                    backoff(&mut restarts);
                }
            }
        }
    }

    fn lookup_attempt(&self, key: Key) -> Result<Option<Payload>, Restart> {
        let (leaf, version) = self.descend(key, |_| {})?;

        let found: Option<Payload> = leaf.search(key);
        leaf.latch().check_or_restart(version)?;

        Ok(found)
    }

    /// Walk from the root to the leaf covering `key`.
    ///
    /// Returns the leaf and its read-locked version. Every internode passed,
    /// with its validated version, is handed to `on_ancestor` top-down.
    pub(super) fn descend<'t>(
        &'t self,
        key: Key,
        mut on_ancestor: impl FnMut(Ancestor<'t, INNER_WIDTH>),
    ) -> Result<(&'t LeafNode<LEAF_WIDTH>, u64), Restart> {
        let mut node: NodePtr = self.load_root();

        // SAFETY: the root is never null and nodes live as long as the tree.
        let mut version: u64 = unsafe { &*node }.latch().read_lock_or_restart()?;

        // A node demoted by a concurrent root growth would miss the keys
        // that moved to its new sibling.
        if self.load_root() != node {
            return Err(Restart);
        }

        loop {
            // SAFETY: `node` was reached through validated reads and is
            // never freed while `self` is borrowed.
            let header: &'t NodeHeader = unsafe { &*node };

            if header.is_leaf() {
                // SAFETY: tagged leaf of this tree's leaf width.
                let leaf: &'t LeafNode<LEAF_WIDTH> = unsafe { &*node.cast() };
                return Ok((leaf, version));
            }

            // SAFETY: tagged internode of this tree's inner width.
            let inode: &'t InternodeNode<INNER_WIDTH> = unsafe { &*node.cast() };

            let child: NodePtr = inode.child(inode.route(key));
            inode.latch().check_or_restart(version)?;

            if child.is_null() {
                return Err(Restart);
            }

            // SAFETY: the pointer was read while `inode` held `version`.
            let child_version: u64 = unsafe { &*child }.latch().read_lock_or_restart()?;
            inode.latch().check_or_restart(version)?;

            on_ancestor((inode, version));

            node = child;
            version = child_version;
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "fail fast in tests")]
mod tests {
    use crate::tree::BTreeGeneric;

    type SmallTree = BTreeGeneric<4, 4>;

    #[test]
    fn test_descend_records_every_internode() {
        let tree = SmallTree::new();
        for k in 0..100 {
            tree.upsert(k, k).unwrap();
        }

        let mut path = Vec::new();
        let (leaf, version) = tree.descend(42, |a| path.push(a)).unwrap();

        assert_eq!(path.len(), tree.height() - 1);
        assert!(leaf.search(42).is_some());
        assert!(leaf.latch().check_or_restart(version).is_ok());

        for (inode, v) in path {
            assert!(inode.latch().check_or_restart(v).is_ok());
        }
    }

    #[test]
    fn test_descend_restarts_on_locked_root() {
        let tree = SmallTree::new();
        let (leaf, version) = tree.descend(1, |_| {}).unwrap();

        let guard = leaf.latch().upgrade_to_write_lock_or_restart(version).unwrap();
        assert!(tree.descend(1, |_| {}).is_err());
        drop(guard);

        assert!(tree.descend(1, |_| {}).is_ok());
    }

    #[test]
    fn test_lookup_after_concurrent_writer_released() {
        let tree = SmallTree::new();
        tree.upsert(3, 30).unwrap();

        let (leaf, version) = tree.descend(3, |_| {}).unwrap();
        let guard = leaf.latch().upgrade_to_write_lock_or_restart(version).unwrap();

        std::thread::scope(|s| {
            let reader = s.spawn(|| tree.lookup(3));
            std::thread::sleep(std::time::Duration::from_millis(10));
            drop(guard);
            assert_eq!(reader.join().unwrap(), Some(30));
        });
    }
}
