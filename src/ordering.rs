//! Memory orderings used by the tree, one constant per access class.
//!
//! Node contents are read optimistically while a writer may be changing
//! them, so every data field is an atomic. Data stores are `Release` and
//! data loads are `Acquire`: a reader that observes any store made inside a
//! write-locked section also observes the lock acquisition that preceded
//! it, so its final version check is guaranteed to fail.

use std::sync::atomic::Ordering;

/// Loads of keys, payloads, counts and child pointers.
pub const DATA_LOAD: Ordering = Ordering::Acquire;

/// Stores of keys, payloads, counts and child pointers (lock held, or the
/// node is not yet reachable by other threads).
pub const DATA_STORE: Ordering = Ordering::Release;

/// Loads of a latch word, both when starting an optimistic read and when
/// validating it.
pub const VERSION_LOAD: Ordering = Ordering::Acquire;

/// Successful latch upgrade. Later data stores must not float above it.
pub const LOCK_SUCCESS: Ordering = Ordering::AcqRel;

/// Failed latch upgrade; the caller only restarts.
pub const LOCK_FAILURE: Ordering = Ordering::Acquire;

/// Latch release: publishes every store made while locked.
pub const UNLOCK: Ordering = Ordering::Release;

/// Loads of the tree's root pointer.
pub const ROOT_LOAD: Ordering = Ordering::Acquire;

/// Successful root swap: the new root is fully built before it is visible.
pub const ROOT_SWAP_SUCCESS: Ordering = Ordering::AcqRel;

/// Failed root swap.
pub const ROOT_SWAP_FAILURE: Ordering = Ordering::Acquire;

/// Informational counters (height, length, statistics).
pub const COUNTER: Ordering = Ordering::Relaxed;
