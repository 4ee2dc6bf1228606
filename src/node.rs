//! Node header shared by leaves and internodes, and the page-derived
//! capacities.
//!
//! Every node starts with a [`NodeHeader`] (`#[repr(C)]`, first field), so a
//! type-erased [`NodePtr`] can be dereferenced as a header to read the kind
//! tag before being cast to the concrete node type.
//!
//! # Page Budget
//!
//! ```text
//! Leaf (4096 bytes):
//! ┌──────────────┬──────────────────────┬──────────────────────┐
//! │ header (16)  │ keys: [u64; 255]     │ payloads: [u64; 255] │
//! └──────────────┴──────────────────────┴──────────────────────┘
//!
//! Internode (4088 of 4096 bytes):
//! ┌──────────────┬──────────────────┬────────────────────┬─────────────┐
//! │ header (16)  │ keys: [u64; 254] │ children: [*; 254] │ rightmost * │
//! └──────────────┴──────────────────┴────────────────────┴─────────────┘
//! ```

use std::mem::size_of;
use std::sync::atomic::AtomicU16;

use crate::latch::OptLatch;
use crate::ordering::{DATA_LOAD, DATA_STORE};

/// Key type stored in the tree.
pub type Key = u64;

/// Payload type stored in the tree.
pub type Payload = u64;

/// Byte budget of one node. Fixed at compile time: it sizes the arrays.
pub const PAGE_SIZE: usize = 4096;

/// Size of [`NodeHeader`].
pub const HEADER_SIZE: usize = size_of::<NodeHeader>();

const KEY_SIZE: usize = size_of::<Key>();
const PAYLOAD_SIZE: usize = size_of::<Payload>();
const CHILD_SIZE: usize = size_of::<NodePtr>();

/// Number of entries a leaf of `page_size` bytes can hold.
///
/// # Panics
/// At compile time if `page_size` cannot fit the header.
#[must_use]
pub const fn leaf_capacity(page_size: usize) -> usize {
    assert!(page_size > HEADER_SIZE, "page too small for a node header");
    (page_size - HEADER_SIZE) / (KEY_SIZE + PAYLOAD_SIZE)
}

/// Number of separator keys an internode of `page_size` bytes can hold.
///
/// One child slot more than keys, hence the extra pointer subtracted first.
///
/// # Panics
/// At compile time if `page_size` cannot fit the header and one child.
#[must_use]
pub const fn inner_capacity(page_size: usize) -> usize {
    assert!(
        page_size > HEADER_SIZE + CHILD_SIZE,
        "page too small for an internode"
    );
    (page_size - HEADER_SIZE - CHILD_SIZE) / (KEY_SIZE + CHILD_SIZE)
}

/// Leaf capacity for [`PAGE_SIZE`].
pub const LEAF_CAPACITY: usize = leaf_capacity(PAGE_SIZE);

/// Internode key capacity for [`PAGE_SIZE`].
pub const INNER_CAPACITY: usize = inner_capacity(PAGE_SIZE);

/// Type-erased pointer to a leaf or an internode.
pub type NodePtr = *mut NodeHeader;

// ============================================================================
//  NodeKind
// ============================================================================

/// Node type tag. Written once at construction, never changed.
///
/// `Leaf` is zero so that zeroed memory is a valid (empty leaf) header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Holds keys and payloads.
    Leaf = 0,
    /// Holds separator keys and child pointers.
    Inner = 1,
}

// ============================================================================
//  NodeHeader
// ============================================================================

/// Latch, entry count and kind tag.
#[repr(C)]
#[derive(Debug)]
pub struct NodeHeader {
    latch: OptLatch,
    count: AtomicU16,
    kind: NodeKind,
}

impl NodeHeader {
    /// Header of an empty, unlocked node at version 0.
    #[must_use]
    pub const fn new(kind: NodeKind) -> Self {
        Self {
            latch: OptLatch::new(),
            count: AtomicU16::new(0),
            kind,
        }
    }

    /// The node's latch.
    #[inline(always)]
    #[must_use]
    pub const fn latch(&self) -> &OptLatch {
        &self.latch
    }

    /// The node's kind.
    #[inline(always)]
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether this header belongs to a leaf.
    #[inline(always)]
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    /// Entry count (keys for both node kinds).
    ///
    /// May be stale under an optimistic read; callers clamp it to their
    /// capacity before indexing.
    #[inline(always)]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(DATA_LOAD) as usize
    }

    /// Set the entry count. Lock held, or node unpublished.
    #[inline(always)]
    pub(crate) fn set_count(&self, count: usize) {
        debug_assert!(u16::try_from(count).is_ok(), "count exceeds u16");

        let count: u16 = u16::try_from(count).unwrap_or(u16::MAX);
        self.count.store(count, DATA_STORE);
    }
}
