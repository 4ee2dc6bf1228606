//! Property-based tests for `OptLatch`.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

use olc_btree::OptLatch;
use proptest::prelude::*;

/// Unlocked latch words (even).
fn unlocked_word() -> impl Strategy<Value = u64> {
    (0u64..u64::MAX / 4).prop_map(|v| v * 2)
}

// ============================================================================
//  Read / Validate
// ============================================================================

proptest! {
    /// An unlocked latch hands out its word and validates it.
    #[test]
    fn read_then_check_succeeds(word in unlocked_word()) {
        let latch = OptLatch::from_word(word);

        let seen = latch.read_lock_or_restart().unwrap();
        prop_assert_eq!(seen, word);
        prop_assert!(latch.check_or_restart(seen).is_ok());
    }

    /// A locked word never starts a read and never validates.
    #[test]
    fn locked_word_rejected(word in unlocked_word()) {
        let latch = OptLatch::from_word(word | 1);

        prop_assert!(latch.is_locked());
        prop_assert!(latch.read_lock_or_restart().is_err());
        prop_assert!(latch.check_or_restart(word).is_err());
        prop_assert!(latch.upgrade_to_write_lock_or_restart(word).is_err());
        prop_assert!(latch.upgrade_to_write_lock_or_restart(word | 1).is_err());
    }

    /// Any other observed word fails validation and upgrade.
    #[test]
    fn mismatched_word_rejected(word in unlocked_word(), other in unlocked_word()) {
        prop_assume!(word != other);
        let latch = OptLatch::from_word(word);

        prop_assert!(latch.check_or_restart(other).is_err());
        prop_assert!(latch.upgrade_to_write_lock_or_restart(other).is_err());
        prop_assert_eq!(latch.word(), word);
    }
}

// ============================================================================
//  Write Lock
// ============================================================================

proptest! {
    /// Lock then unlock advances the version by exactly one step.
    #[test]
    fn write_cycle_advances_by_two(word in unlocked_word()) {
        let latch = OptLatch::from_word(word);

        let guard = latch.upgrade_to_write_lock_or_restart(word).unwrap();
        prop_assert_eq!(guard.locked_word(), word | 1);
        prop_assert_eq!(guard.next_version(), word + 2);
        prop_assert!(latch.is_locked());
        guard.unlock();

        prop_assert_eq!(latch.word(), word + 2);
        prop_assert!(!latch.is_locked());
    }

    /// Versions strictly increase over any number of write cycles, and every
    /// earlier observation is invalidated.
    #[test]
    fn versions_strictly_increase(word in unlocked_word(), cycles in 1usize..50) {
        let latch = OptLatch::from_word(word);
        let first = latch.read_lock_or_restart().unwrap();
        let mut last = first;

        for _ in 0..cycles {
            let v = latch.read_lock_or_restart().unwrap();
            drop(latch.upgrade_to_write_lock_or_restart(v).unwrap());

            let now = latch.word();
            prop_assert!(now > last);
            last = now;
        }

        prop_assert!(latch.check_or_restart(first).is_err());
        prop_assert_eq!(last, word + 2 * cycles as u64);
    }
}
