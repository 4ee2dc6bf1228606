//! Structural check of a quiescent tree.
//!
//! [`BTreeGeneric::verify`] walks every node and reports the first broken
//! invariant, or the tree's shape. It reads through the same atomics as
//! the optimistic paths, so calling it concurrently with writers is memory
//! safe, but the result is then meaningless.

use std::error::Error as StdError;
use std::fmt as StdFmt;

use crate::internode::InternodeNode;
use crate::leaf::LeafNode;
use crate::node::{Key, NodeHeader, NodePtr};

use super::BTreeGeneric;

/// Shape of a tree that passed [`BTreeGeneric::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeShape {
    /// Levels from root to leaf.
    pub height: usize,
    /// Keys of every leaf, left to right.
    pub leaves: Vec<Vec<Key>>,
    /// Number of internodes.
    pub inner_nodes: usize,
    /// Separators of the root (empty if the root is a leaf).
    pub root_separators: Vec<Key>,
}

impl TreeShape {
    /// Total number of keys stored in leaves.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.leaves.iter().map(Vec::len).sum()
    }
}

/// First structural invariant found broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A node was write-locked; the tree is not quiescent.
    LockedNode {
        /// Depth of the node (root = 0).
        depth: usize,
    },
    /// A node holds more entries than its width.
    OverCapacity {
        /// Depth of the node.
        depth: usize,
        /// Raw entry count.
        count: usize,
        /// Node width.
        capacity: usize,
    },
    /// Keys inside a node are not strictly increasing.
    UnsortedKeys {
        /// Depth of the node.
        depth: usize,
        /// Slot of the first key not greater than its predecessor.
        index: usize,
    },
    /// A key lies outside the range its parent routes to the node.
    KeyOutOfRange {
        /// The offending key.
        key: Key,
        /// Inclusive lower bound, if any.
        lower: Option<Key>,
        /// Exclusive upper bound, if any.
        upper: Option<Key>,
    },
    /// A live child slot holds null.
    NullChild {
        /// Depth of the internode.
        depth: usize,
        /// Child index.
        index: usize,
    },
    /// A leaf other than the root is empty.
    EmptyLeaf {
        /// Depth of the leaf.
        depth: usize,
    },
    /// Leaves at different depths.
    UnevenDepth {
        /// Depth of the first leaf found.
        expected: usize,
        /// Depth of a later leaf.
        found: usize,
    },
    /// The height counter disagrees with the leaf depth.
    HeightMismatch {
        /// Value of the height counter.
        recorded: usize,
        /// Levels found by the walk.
        actual: usize,
    },
    /// The length counter disagrees with the number of stored keys.
    LenMismatch {
        /// Value of the length counter.
        recorded: usize,
        /// Keys found in leaves.
        actual: usize,
    },
}

impl StdFmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::LockedNode { depth } => write!(f, "node at depth {depth} is locked"),

            Self::OverCapacity {
                depth,
                count,
                capacity,
            } => write!(
                f,
                "node at depth {depth} holds {count} entries, capacity {capacity}"
            ),

            Self::UnsortedKeys { depth, index } => {
                write!(f, "keys out of order at depth {depth}, slot {index}")
            }

            Self::KeyOutOfRange { key, lower, upper } => {
                write!(f, "key {key} outside [{lower:?}, {upper:?})")
            }

            Self::NullChild { depth, index } => {
                write!(f, "null child {index} in internode at depth {depth}")
            }

            Self::EmptyLeaf { depth } => write!(f, "empty non-root leaf at depth {depth}"),

            Self::UnevenDepth { expected, found } => {
                write!(f, "leaf at depth {found}, expected {expected}")
            }

            Self::HeightMismatch { recorded, actual } => {
                write!(f, "height counter {recorded}, tree has {actual} levels")
            }

            Self::LenMismatch { recorded, actual } => {
                write!(f, "length counter {recorded}, leaves hold {actual} keys")
            }
        }
    }
}

impl StdError for InvariantViolation {}

/// Node waiting to be visited, with the key range its parent routes to it.
struct Pending {
    node: NodePtr,
    depth: usize,
    lower: Option<Key>,
    upper: Option<Key>,
}

fn check_keys(
    keys: &[Key],
    depth: usize,
    lower: Option<Key>,
    upper: Option<Key>,
) -> Result<(), InvariantViolation> {
    if let Some(index) = (1..keys.len()).find(|&i| keys[i - 1] >= keys[i]) {
        return Err(InvariantViolation::UnsortedKeys { depth, index });
    }

    let in_range =
        |k: Key| lower.is_none_or(|lo| k >= lo) && upper.is_none_or(|hi| k < hi);

    match keys.iter().copied().find(|&k| !in_range(k)) {
        Some(key) => Err(InvariantViolation::KeyOutOfRange { key, lower, upper }),
        None => Ok(()),
    }
}

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> BTreeGeneric<LEAF_WIDTH, INNER_WIDTH> {
    /// Check every structural invariant and return the tree's shape.
    ///
    /// Meant for quiescent trees (tests, after joining writers). Checks key
    /// order, separator ranges, capacities, uniform leaf depth, and the
    /// height and length counters.
    ///
    /// # Errors
    /// The first [`InvariantViolation`] found, in depth-first order.
    pub fn verify(&self) -> Result<TreeShape, InvariantViolation> {
        let root: NodePtr = self.load_root();

        let mut shape = TreeShape {
            height: 0,
            leaves: Vec::new(),
            inner_nodes: 0,
            root_separators: Vec::new(),
        };

        let mut stack: Vec<Pending> = vec![Pending {
            node: root,
            depth: 0,
            lower: None,
            upper: None,
        }];

        while let Some(Pending {
            node,
            depth,
            lower,
            upper,
        }) = stack.pop()
        {
            // SAFETY: reachable nodes live as long as the tree.
            let header: &NodeHeader = unsafe { &*node };

            if header.latch().is_locked() {
                return Err(InvariantViolation::LockedNode { depth });
            }

            if header.is_leaf() {
                if header.count() > LEAF_WIDTH {
                    return Err(InvariantViolation::OverCapacity {
                        depth,
                        count: header.count(),
                        capacity: LEAF_WIDTH,
                    });
                }

                // SAFETY: tagged leaf of this tree's width.
                let leaf: &LeafNode<LEAF_WIDTH> = unsafe { &*node.cast() };
                let keys: Vec<Key> = leaf.keys();

                if keys.is_empty() && depth > 0 {
                    return Err(InvariantViolation::EmptyLeaf { depth });
                }
                check_keys(&keys, depth, lower, upper)?;

                let levels: usize = depth + 1;
                if shape.height == 0 {
                    shape.height = levels;
                } else if shape.height != levels {
                    return Err(InvariantViolation::UnevenDepth {
                        expected: shape.height,
                        found: levels,
                    });
                }

                shape.leaves.push(keys);
                continue;
            }

            if header.count() > INNER_WIDTH {
                return Err(InvariantViolation::OverCapacity {
                    depth,
                    count: header.count(),
                    capacity: INNER_WIDTH,
                });
            }

            // SAFETY: tagged internode of this tree's width.
            let inode: &InternodeNode<INNER_WIDTH> = unsafe { &*node.cast() };
            let keys: Vec<Key> = inode.keys();
            check_keys(&keys, depth, lower, upper)?;

            shape.inner_nodes += 1;
            if depth == 0 {
                shape.root_separators.clone_from(&keys);
            }

            // Push right-to-left so leaves are collected left-to-right.
            for i in (0..=keys.len()).rev() {
                let child: NodePtr = inode.child(i);
                if child.is_null() {
                    return Err(InvariantViolation::NullChild { depth, index: i });
                }

                stack.push(Pending {
                    node: child,
                    depth: depth + 1,
                    lower: if i == 0 { lower } else { keys.get(i - 1).copied() },
                    upper: keys.get(i).copied().or(upper),
                });
            }
        }

        let recorded: usize = self.height();
        if recorded != shape.height {
            return Err(InvariantViolation::HeightMismatch {
                recorded,
                actual: shape.height,
            });
        }

        let recorded: usize = self.len();
        if recorded != shape.key_count() {
            return Err(InvariantViolation::LenMismatch {
                recorded,
                actual: shape.key_count(),
            });
        }

        Ok(shape)
    }
}
