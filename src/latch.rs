//! Versioned latch for optimistic lock coupling.
//!
//! [`OptLatch`] packs a version counter and a locked flag into one
//! `AtomicU64`. Readers never block: they remember the version, read the
//! node, then validate that the version is unchanged. Writers upgrade from
//! an observed version to exclusive mode and bump the version on release.
//!
//! # Protocol
//! 1. Readers: [`OptLatch::read_lock_or_restart`], read node fields,
//!    [`OptLatch::check_or_restart`]. Any `Err(Restart)` discards the read.
//! 2. Writers: [`OptLatch::upgrade_to_write_lock_or_restart`] with the
//!    version observed during descent, modify the node, drop the returned
//!    [`WriteGuard`].
//!
//! # Layout
//! Bit 0: `locked` | Bits 1-63: version counter
//!
//! Locking sets bit 0 (`v -> v + 1`), unlocking adds one more (`v + 1 ->
//! v + 2`), so the word seen after a completed write is always strictly
//! greater than any word observed before it, and a locked word is odd.
//!
//! ```rust
//! use olc_btree::latch::OptLatch;
//!
//! let latch = OptLatch::new();
//! let seen = latch.read_lock_or_restart().unwrap();
//!
//! let guard = latch.upgrade_to_write_lock_or_restart(seen).unwrap();
//! drop(guard);
//!
//! assert!(latch.check_or_restart(seen).is_err());
//! ```

use std::fmt as StdFmt;
use std::hint as StdHint;
use std::marker::PhantomData;
use std::sync::atomic::AtomicU64;

use crate::ordering::{LOCK_FAILURE, LOCK_SUCCESS, UNLOCK, VERSION_LOAD};



/// Locked flag.
const LOCK_BIT: u64 = 1;

/// Distance between two consecutive unlocked versions.
const VERSION_STEP: u64 = 2;

// ============================================================================
//  Restart
// ============================================================================

/// Control signal: the caller's view of the tree may be inconsistent and
/// the whole operation must start again from the root.
///
/// Not an error in the usual sense. It never escapes the tree's retry
/// loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restart;

impl StdFmt::Display for Restart {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        write!(f, "optimistic read invalidated, restart from root")
    }
}

// ============================================================================
//  OptLatch
// ============================================================================

/// Per-node optimistic latch: version counter plus locked flag.
#[derive(Debug)]
pub struct OptLatch {
    word: AtomicU64,
}

impl OptLatch {
    /// Create an unlocked latch at version 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            word: AtomicU64::new(0),
        }
    }

    /// Create a latch from a raw word.
    ///
    /// Intended for tests that need a specific starting state.
    #[must_use]
    pub const fn from_word(word: u64) -> Self {
        Self {
            word: AtomicU64::new(word),
        }
    }

    /// Raw latch word (version and locked flag).
    #[inline]
    #[must_use]
    pub fn word(&self) -> u64 {
        self.word.load(VERSION_LOAD)
    }

    /// Whether a writer currently holds this latch.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.word() & LOCK_BIT != 0
    }

    /// Begin an optimistic read.
    ///
    /// Returns the current version, or `Err(Restart)` if the node is
    /// write-locked. Never blocks.
    #[inline]
    pub fn read_lock_or_restart(&self) -> Result<u64, Restart> {
        let version: u64 = self.word.load(VERSION_LOAD);

        if version & LOCK_BIT != 0 {
            StdHint::spin_loop();
            return Err(Restart);
        }

        Ok(version)
    }

    /// Validate an optimistic read.
    ///
    /// `Err(Restart)` if the node was modified, or is being modified, since
    /// `observed` was returned by [`read_lock_or_restart`](Self::read_lock_or_restart).
    #[inline]
    pub fn check_or_restart(&self, observed: u64) -> Result<(), Restart> {
        if self.word.load(VERSION_LOAD) == observed {
            Ok(())
        } else {
            Err(Restart)
        }
    }

    /// Turn an optimistic read at `observed` into exclusive access.
    ///
    /// Fails if the version moved since `observed` or the node is locked.
    /// On success the lock is held until the returned guard drops.
    #[inline]
    pub fn upgrade_to_write_lock_or_restart(
        &self,
        observed: u64,
    ) -> Result<WriteGuard<'_>, Restart> {
        if observed & LOCK_BIT != 0 {
            return Err(Restart);
        }

        let locked: u64 = observed | LOCK_BIT;

        match self
            .word
            .compare_exchange(observed, locked, LOCK_SUCCESS, LOCK_FAILURE)
        {
            Ok(_) => Ok(WriteGuard {
                latch: self,
                locked_word: locked,
                _marker: PhantomData,
            }),

            Err(_) => Err(Restart),
        }
    }
}

impl Default for OptLatch {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  WriteGuard
// ============================================================================

/// Proof that the latch is write-locked by the current thread.
///
/// Mutating node operations take `&WriteGuard` to show the lock is held.
/// Dropping the guard performs `writeUnlock`: clears the locked flag and
/// advances the version, which invalidates every concurrent optimistic read
/// of the node. Release happens on unwinding too.
///
/// `!Send` and `!Sync`: the guard must be released by the thread that took
/// it.
#[derive(Debug)]
#[must_use = "dropping the guard immediately releases the write lock"]
pub struct WriteGuard<'a> {
    latch: &'a OptLatch,
    locked_word: u64,
    _marker: PhantomData<*mut ()>,
}

impl WriteGuard<'_> {
    /// The latch word while locked (odd).
    #[inline]
    #[must_use]
    pub const fn locked_word(&self) -> u64 {
        self.locked_word
    }

    /// Version readers will observe once this guard is released.
    #[inline]
    #[must_use]
    pub const fn next_version(&self) -> u64 {
        self.locked_word - LOCK_BIT + VERSION_STEP
    }

    /// Whether this guard locks `latch`.
    #[inline]
    #[must_use]
    pub fn guards(&self, latch: &OptLatch) -> bool {
        std::ptr::eq(self.latch, latch)
    }

    /// Release the lock now. Same as dropping the guard.
    #[inline]
    pub fn unlock(self) {
        drop(self);
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        // Odd -> even: clears LOCK_BIT and completes the VERSION_STEP.
        self.latch.word.fetch_add(LOCK_BIT, UNLOCK);
    }
}

// ============================================================================
//  Tests
// ============================================================================
