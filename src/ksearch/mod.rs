//! Binary searches over sorted node keys.
//!
//! Two flavours, both over the first `len` keys produced by `key_at`:
//! - [`lower_bound`]: first index whose key is `>= key`. Leaf lookup, leaf
//!   insert position, internode insert position.
//! - [`upper_bound`]: first index whose key is `> key`. Internode routing, so
//!   a key equal to a separator goes to the right-hand child.
//!
//! Keys live in atomics, hence the accessor closure instead of a slice.

use crate::node::Key;

/// First index `i` in `0..len` with `key_at(i) >= key`, or `len`.
///
/// # Example
///
/// ```rust
/// use olc_btree::ksearch::lower_bound;
///
/// let keys = [10, 20, 30];
/// assert_eq!(lower_bound(keys.len(), 20, |i| keys[i]), 1);
/// assert_eq!(lower_bound(keys.len(), 25, |i| keys[i]), 2);
/// assert_eq!(lower_bound(keys.len(), 99, |i| keys[i]), 3);
/// ```
#[inline]
pub fn lower_bound(len: usize, key: Key, key_at: impl Fn(usize) -> Key) -> usize {
    let mut lo: usize = 0;
    let mut hi: usize = len;

    while lo < hi {
        let mid: usize = lo + (hi - lo) / 2;

        if key_at(mid) < key {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    lo
}

/// First index `i` in `0..len` with `key < key_at(i)`, or `len`.
///
/// Used as the child index when routing through an internode: child `i`
/// covers `[keys[i - 1], keys[i])`.
///
/// # Example
///
/// ```rust
/// use olc_btree::ksearch::upper_bound;
///
/// let separators = [30];
/// assert_eq!(upper_bound(1, 29, |i| separators[i]), 0);
/// assert_eq!(upper_bound(1, 30, |i| separators[i]), 1);
/// ```
#[inline]
pub fn upper_bound(len: usize, key: Key, key_at: impl Fn(usize) -> Key) -> usize {
    let mut lo: usize = 0;
    let mut hi: usize = len;

    while lo < hi {
        let mid: usize = lo + (hi - lo) / 2;

        if key < key_at(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    lo
}
