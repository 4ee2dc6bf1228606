//! Node allocation for the tree.
//!
//! Nodes are page-sized, so they are allocated zeroed straight on the heap
//! rather than built on the stack and moved into a `Box`. Allocation is
//! fallible: running out of memory is the one hard failure the tree
//! reports to callers ([`TreeError::AllocationFailed`]).
//!
//! # Lifecycle
//!
//! ```text
//!  try_new ──► Unpublished<N> ──publish()──► NodePtr in the tree ──► reclaim at tree drop
//!                   │
//!                   └── dropped (restart, lost root race) ──► freed immediately
//! ```
//!
//! A node is *unpublished* until a pointer to it is stored in a reachable
//! node or in the root. No other thread can hold a reference to it before
//! that, so discarding it needs no grace period. Published nodes are never
//! unlinked while the tree lives (splits keep the left node in place), so
//! they are only freed by [`reclaim::reclaim_subtree`] when the tree drops.

use std::alloc::{Layout, alloc_zeroed};
use std::fmt as StdFmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::node::{NodeHeader, NodeKind, NodePtr};
use crate::tracing_helpers::trace_log;
use crate::tree::TreeError;

pub(crate) mod reclaim;

/// Node types that can be allocated by zeroing memory.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with a [`NodeHeader`] as their first
/// field, and the all-zero bit pattern must be a valid value of the type.
pub(crate) unsafe trait ZeroedNode: Sized {
    /// Kind written into the header after allocation.
    const KIND: NodeKind;
}

// ============================================================================
//  Unpublished
// ============================================================================

/// Owning handle to a node that no other thread can reach yet.
///
/// Dropping the handle frees the node. [`publish`](Self::publish) hands
/// ownership to the tree once the node has been linked in.
pub(crate) struct Unpublished<N: ZeroedNode> {
    ptr: NonNull<N>,
}

impl<N: ZeroedNode> Unpublished<N> {
    /// Allocate an empty node of kind `N::KIND`.
    pub(crate) fn try_new() -> Result<Self, TreeError> {
        let layout: Layout = Layout::new::<N>();

        // SAFETY: `N` starts with a `NodeHeader`, so the layout is non-zero.
        let raw: *mut N = unsafe { alloc_zeroed(layout) }.cast::<N>();

        let Some(ptr) = NonNull::new(raw) else {
            return Err(TreeError::AllocationFailed {
                bytes: layout.size(),
            });
        };

        // SAFETY: freshly allocated, properly aligned for `N`, and the
        // header is the first field of a `#[repr(C)]` node (ZeroedNode
        // contract). Zeroed memory is already a valid `N`; this only sets
        // the kind tag.
        unsafe { ptr.cast::<NodeHeader>().as_ptr().write(NodeHeader::new(N::KIND)) };

        Ok(Self { ptr })
    }

    /// Type-erased pointer for linking into a parent or the root.
    ///
    /// Ownership stays with the handle until [`publish`](Self::publish).
    #[inline]
    pub(crate) const fn node_ptr(&self) -> NodePtr {
        self.ptr.as_ptr().cast::<NodeHeader>()
    }

    /// Give up ownership: the node is now reachable from the tree.
    #[inline]
    pub(crate) fn publish(self) -> NodePtr {
        let this = ManuallyDrop::new(self);
        this.node_ptr()
    }
}

impl<N: ZeroedNode> Deref for Unpublished<N> {
    type Target = N;

    #[inline]
    fn deref(&self) -> &N {
        // SAFETY: valid allocation owned by this handle.
        unsafe { self.ptr.as_ref() }
    }
}

impl<N: ZeroedNode> DerefMut for Unpublished<N> {
    #[inline]
    fn deref_mut(&mut self) -> &mut N {
        // SAFETY: valid allocation, exclusively owned (unreachable by others).
        unsafe { self.ptr.as_mut() }
    }
}

impl<N: ZeroedNode> Drop for Unpublished<N> {
    fn drop(&mut self) {
        trace_log!(node = ?self.ptr, "discarding unpublished node");

        // SAFETY: allocated with the global allocator and `Layout::new::<N>()`,
        // exactly what `Box<N>` uses; never published, so never shared.
        unsafe { drop(Box::from_raw(self.ptr.as_ptr())) };
    }
}

impl<N: ZeroedNode> StdFmt::Debug for Unpublished<N> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("Unpublished")
            .field("ptr", &self.ptr)
            .field("kind", &N::KIND)
            .finish()
    }
}

// ============================================================================
//  Tests
// ============================================================================
