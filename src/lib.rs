//! # `olc-btree`
//!
//! An in-memory concurrent B+tree over `u64` keys and `u64` payloads,
//! synchronized with optimistic lock coupling (OLC).
//!
//! Readers never take a lock: they record each node's version on the way
//! down and validate it afterwards, restarting from the root when anything
//! changed. Writers lock only the nodes they modify, upgrading from the
//! versions seen during descent.
//!
//! | Feature | Status |
//! |---------|--------|
//! | Concurrent lookup | Lock-free, version-validated |
//! | Concurrent upsert | Leaf lock; ancestors only on split |
//! | Split propagation | Leaf and internode, prepare-then-commit |
//! | Root growth | CAS under a growth lock |
//! | Memory reclamation | Nodes freed at tree drop (never unlinked before) |
//! | Deletion, range scans | Not implemented |
//!
//! ## Thread Safety
//!
//! [`OlcBTree`] is `Send + Sync`; share it by reference or `Arc`.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use olc_btree::OlcBTree;
//!
//! let tree = Arc::new(OlcBTree::new());
//!
//! let handles: Vec<_> = (0..4u64)
//!     .map(|t| {
//!         let tree = Arc::clone(&tree);
//!         thread::spawn(move || {
//!             for k in (t * 1000)..(t * 1000 + 1000) {
//!                 tree.upsert(k, k * 2).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//!
//! assert_eq!(tree.len(), 4000);
//! assert_eq!(tree.lookup(2500), Some(5000));
//! ```
//!
//! ## Node Sizes
//!
//! Nodes are sized to a [`PAGE_SIZE`](node::PAGE_SIZE) of 4096 bytes: a leaf
//! holds [`LEAF_CAPACITY`] = 255 entries and an internode
//! [`INNER_CAPACITY`] = 254 separators. [`BTreeGeneric`] takes both widths
//! as const parameters for testing with small nodes.
//!
//! ## Logging
//!
//! Enable the `tracing` feature to emit `tracing` events for restarts
//! (trace), splits and root growth (debug), and lost root races (warn).

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::inline_always)]

mod alloc;
pub mod internode;
pub mod ksearch;
pub mod latch;
pub mod leaf;
pub mod node;
pub mod ordering;
pub mod tree;

mod tracing_helpers;

pub use latch::{OptLatch, Restart, WriteGuard};
pub use node::{INNER_CAPACITY, Key, LEAF_CAPACITY, PAGE_SIZE, Payload};
pub use tree::{
    BTreeGeneric, InvariantViolation, OlcBTree, RESTART_YIELD_INTERVAL, TreeError, TreeShape,
    TreeStats,
};
