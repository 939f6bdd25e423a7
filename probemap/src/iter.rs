use std::iter::FusedIterator;

use crate::HashedDictionary;
use crate::error::{DictError, Result};
use crate::slot::Slot;

/// Iterator over key-value pairs in a HashedDictionary, in slot order.
///
/// The number of entries to yield is fixed when the iterator is created; the
/// shared borrow of the table keeps it from changing underneath.
pub struct Iter<'a, K, V> {
    slots: std::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(slots: &'a [Slot<K, V>], remaining: usize) -> Self {
        Self {
            slots: slots.iter(),
            remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        for slot in self.slots.by_ref() {
            if let Some(entry) = slot.entry() {
                self.remaining -= 1;
                return Some(entry);
            }
        }

        self.remaining = 0;
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            remaining: self.remaining,
        }
    }
}

/// Iterator over keys in a HashedDictionary
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Keys<'a, K, V> {
    pub(crate) fn new(inner: Iter<'a, K, V>) -> Self {
        Self { inner }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// Iterator over values in a HashedDictionary
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Values<'a, K, V> {
    pub(crate) fn new(inner: Iter<'a, K, V>) -> Self {
        Self { inner }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Values<'_, K, V> {}

/// A key cursor that does not borrow the table.
///
/// It records the live entry count, the slot count and the table generation
/// when created and is driven by handing it the table that created it on
/// every step. The table must not gain or lose keys, or rehash, while a
/// cursor is in use: if it does, [`next_key`](Self::next_key) reports
/// [`DictError::IteratorInvalidated`] instead of skipping or repeating keys.
/// A different table of another size is reported the same way; one of the
/// same size and generation cannot be told apart. Asking for a key after
/// the last one reports [`DictError::IterationExhausted`].
///
/// There is no way to remove entries through a cursor.
#[derive(Debug, Clone)]
pub struct KeyCursor {
    current_index: usize,
    remaining: usize,
    capacity: usize,
    generation: u64,
}

impl KeyCursor {
    pub(crate) fn new(remaining: usize, capacity: usize, generation: u64) -> Self {
        Self {
            current_index: 0,
            remaining,
            capacity,
            generation,
        }
    }

    pub fn has_next(&self) -> bool {
        self.remaining > 0
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn next_key<'t, K, V, S>(&mut self, table: &'t HashedDictionary<K, V, S>) -> Result<&'t K> {
        if table.generation() != self.generation || table.capacity() != self.capacity {
            return Err(DictError::IteratorInvalidated {
                expected: self.generation,
                found: table.generation(),
            });
        }
        if !self.has_next() {
            return Err(DictError::IterationExhausted);
        }

        let slots = table.slots();
        while self.current_index < slots.len() {
            let slot = &slots[self.current_index];
            self.current_index += 1;
            if let Some(key) = slot.key() {
                self.remaining -= 1;
                return Ok(key);
            }
        }

        // only reachable when driven with a different table
        self.remaining = 0;
        Err(DictError::IterationExhausted)
    }
}
