//! Linear probing over a slice of slots.
//!
//! Both walks start at the key's home index and step by one, wrapping at the
//! end of the slice. They visit every slot at most once, so they terminate
//! even on an array with no `Empty` slot left.

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};

use crate::slot::Slot;

/// Home index of `key` in a table of `len` slots.
pub fn hash_index<Q, S>(hasher: &S, key: &Q, len: usize) -> usize
where
    Q: Hash + ?Sized,
    S: BuildHasher,
{
    debug_assert!(len > 0);
    (hasher.hash_one(key) % len as u64) as usize
}

/// Finds the occupied slot holding `key`.
///
/// Tombstones are stepped over since the key may have been placed past them;
/// the walk stops at the first `Empty` slot.
pub fn locate<K, V, Q>(slots: &[Slot<K, V>], start: usize, key: &Q) -> Option<usize>
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    let len = slots.len();
    let mut index = start;

    for _ in 0..len {
        match &slots[index] {
            Slot::Empty => return None,
            Slot::Occupied(k, _) if k.borrow() == key => return Some(index),
            _ => {}
        }
        index = (index + 1) % len;
    }

    None
}

/// Finds where `key` lives or where it should be inserted.
///
/// Returns `Ok(index)` when an occupied slot already holds the key and
/// `Err(index)` with the insertion slot otherwise. The insertion slot is the
/// first tombstone met on the way, falling back to the `Empty` slot that ended
/// the walk. `Err(slots.len())` means the array has neither, which the growth
/// policy rules out.
pub fn probe<K, V>(slots: &[Slot<K, V>], start: usize, key: &K) -> Result<usize, usize>
where
    K: Eq,
{
    let len = slots.len();
    let mut index = start;
    let mut first_removed = None;

    for _ in 0..len {
        match &slots[index] {
            Slot::Empty => return Err(first_removed.unwrap_or(index)),
            Slot::Occupied(k, _) if k == key => return Ok(index),
            Slot::Occupied(..) => {}
            Slot::Removed(_) => {
                first_removed.get_or_insert(index);
            }
        }
        index = (index + 1) % len;
    }

    Err(first_removed.unwrap_or(len))
}
