//! Upsert: optimistic descent, then a write lock on the leaf only.
//!
//! The common case touches one lock: the leaf is upgraded from the version
//! seen during descent and the entry is inserted or overwritten in place.
//! Only an insert into a full leaf hands over to [`split`](super::split).

use crate::latch::WriteGuard;
use crate::leaf::LeafInsert;
use crate::node::{Key, Payload};
use crate::ordering::COUNTER;
use crate::tracing_helpers::trace_log;

use super::optimistic::Ancestor;
use super::{Abort, BTreeGeneric, TreeError, backoff};

impl<const LEAF_WIDTH: usize, const INNER_WIDTH: usize> BTreeGeneric<LEAF_WIDTH, INNER_WIDTH> {
    /// Insert `key` with `payload`, or overwrite the payload if `key` is
    /// already present.
    ///
    /// Overwriting never splits, even when the leaf is full.
    ///
    /// # Errors
    /// [`TreeError::AllocationFailed`] if a split needed a node that could
    /// not be allocated. The tree is unchanged in that case.
    pub fn upsert(&self, key: Key, payload: Payload) -> Result<(), TreeError> {
        let mut path: Vec<Ancestor<'_, INNER_WIDTH>> = Vec::with_capacity(self.height() + 1);
        let mut restarts: u64 = 0;

        loop {
            path.clear();

            match self.upsert_attempt(key, payload, &mut path) {
                Ok(()) => {
                    self.counters.record_upsert_restarts(restarts);
                    return Ok(());
                }

                Err(Abort::Restart) => {
                    trace_log!(key, restarts, "upsert restart");
                    backoff(&mut restarts);
                }

                Err(Abort::Fatal(err)) => return Err(err),
            }
        }
    }

    fn upsert_attempt<'t>(
        &'t self,
        key: Key,
        payload: Payload,
        path: &mut Vec<Ancestor<'t, INNER_WIDTH>>,
    ) -> Result<(), Abort> {
        let (leaf, version) = self.descend(key, |ancestor| path.push(ancestor))?;

        let guard: WriteGuard<'t> = leaf.latch().upgrade_to_write_lock_or_restart(version)?;

        if !leaf.is_full() || leaf.find(key).is_ok() {
            if leaf.insert(&guard, key, payload) == LeafInsert::Inserted {
                self.len.fetch_add(1, COUNTER);
            }
            return Ok(());
        }

        self.split_and_insert(leaf, guard, key, payload, path)
    }
}
