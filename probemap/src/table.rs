use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use log::{debug, trace};
use rustc_hash::FxBuildHasher;

use crate::config::TableConfig;
use crate::error::Result;
use crate::iter::{Iter, KeyCursor, Keys, Values};
use crate::prime::next_prime;
use crate::probe::{hash_index, locate, probe};
use crate::slot::Slot;

/// An open address dictionary with linear probing and lazy deletion.
///
/// Removing a key leaves a tombstone behind so that probe runs passing
/// through the slot stay intact. Tombstones are reused by later insertions
/// and dropped wholesale when the table rehashes. The slot count is always
/// prime and at least doubles whenever the load factor is reached; a table
/// clogged with tombstones is rebuilt at its current size instead.
///
/// The table is not synchronised; share it across threads behind a lock.
pub struct HashedDictionary<K, V, S = FxBuildHasher> {
    slots: Vec<Slot<K, V>>,
    entry_count: usize,
    used_count: usize,
    max_load_factor: f64,
    generation: u64,
    hasher: S,
}

impl<K, V> Default for HashedDictionary<K, V, FxBuildHasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HashedDictionary<K, V, FxBuildHasher> {
    /// Creates an empty dictionary with the default capacity and load factor.
    pub fn new() -> Self {
        Self::with_hasher(FxBuildHasher)
    }

    /// Creates an empty dictionary with at least `capacity` slots, rounded up
    /// to the next prime.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(
            TableConfig::default().with_initial_capacity(capacity),
            FxBuildHasher,
        )
    }

    pub fn with_config(config: TableConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, FxBuildHasher)
    }
}

impl<K, V, S> HashedDictionary<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::build(TableConfig::default(), hasher)
    }

    pub fn with_config_and_hasher(config: TableConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, hasher))
    }

    fn build(config: TableConfig, hasher: S) -> Self {
        Self {
            slots: empty_slots(next_prime(config.initial_capacity)),
            entry_count: 0,
            used_count: 0,
            max_load_factor: config.max_load_factor,
            generation: 0,
            hasher,
        }
    }

    /// Returns the number of live entries
    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Returns the number of slots in the backing array (always prime)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of slots that are not empty, tombstones included
    pub fn used_count(&self) -> usize {
        self.used_count
    }

    /// Returns the load factor of the table (live entries / slots)
    pub fn load_factor(&self) -> f64 {
        self.entry_count as f64 / self.slots.len() as f64
    }

    pub fn max_load_factor(&self) -> f64 {
        self.max_load_factor
    }

    /// Counter bumped by every insertion of a new key, every removal and
    /// every rehash. Value updates leave it alone.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// True when the live entries have reached the max load factor, so the
    /// next insertion doubles the table first.
    pub fn is_too_full(&self) -> bool {
        self.entry_count as f64 >= self.max_load_factor * self.slots.len() as f64
    }

    /// Taking one more empty slot would leave none, which only tombstones can
    /// cause while the load factor is respected.
    fn is_saturated(&self) -> bool {
        self.used_count + 1 >= self.slots.len()
    }

    /// Lazily yields the live keys in slot order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(self.iter())
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.slots, self.entry_count)
    }

    /// A detached cursor over the live keys, see [`KeyCursor`].
    pub fn key_cursor(&self) -> KeyCursor {
        KeyCursor::new(self.entry_count, self.slots.len(), self.generation)
    }

    pub(crate) fn slots(&self) -> &[Slot<K, V>] {
        &self.slots
    }
}

impl<K, V, S> HashedDictionary<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Inserts a key-value pair, returning the previous value if the key was
    /// already present.
    ///
    /// Grows the table first when it is too full, or rebuilds it at the same
    /// size when tombstones are about to take the last empty slot.
    pub fn add(&mut self, key: K, value: V) -> Option<V> {
        if self.is_too_full() {
            self.rehash();
        } else if self.is_saturated() {
            trace!(
                "{} of {} slots used with {} live entries, rehashing to drop tombstones",
                self.used_count,
                self.slots.len(),
                self.entry_count
            );
            self.rehash_to(self.slots.len());
            // a load factor close to 1 can leave the table saturated without tombstones
            if self.is_saturated() {
                self.rehash();
            }
        }
        self.insert_entry(key, value)
    }

    fn insert_entry(&mut self, key: K, value: V) -> Option<V> {
        let start = hash_index(&self.hasher, &key, self.slots.len());
        match probe(&self.slots, start, &key) {
            Ok(slot_idx) => match &mut self.slots[slot_idx] {
                Slot::Occupied(_, stored) => Some(std::mem::replace(stored, value)),
                _ => unreachable!("probe returned a slot that is not occupied"),
            },
            Err(slot_idx) => {
                assert!(
                    slot_idx < self.slots.len(),
                    "no free slot in a table of {} slots",
                    self.slots.len()
                );
                if self.slots[slot_idx].is_empty() {
                    self.used_count += 1;
                }
                self.slots[slot_idx] = Slot::Occupied(key, value);
                self.entry_count += 1;
                self.generation = self.generation.wrapping_add(1);
                None
            }
        }
    }

    /// Moves every live entry into a fresh array of the next prime at least
    /// twice the current size, dropping all tombstones.
    fn rehash(&mut self) {
        self.rehash_to(next_prime(self.slots.len().saturating_mul(2)));
    }

    /// Rebuilds the slot array with `new_capacity` slots. Called with the
    /// current length this only clears tombstones.
    fn rehash_to(&mut self, new_capacity: usize) {
        let old_capacity = self.slots.len();
        debug!(
            "rehashing {} entries from {} to {} slots",
            self.entry_count, old_capacity, new_capacity
        );

        let old_slots = std::mem::replace(&mut self.slots, empty_slots(new_capacity));
        self.entry_count = 0;
        self.used_count = 0;
        self.generation = self.generation.wrapping_add(1);

        for (key, value) in old_slots.into_iter().filter_map(Slot::into_entry) {
            self.insert_entry(key, value);
        }
    }

    fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.is_empty() {
            return None;
        }
        let start = hash_index(&self.hasher, key, self.slots.len());
        locate(&self.slots, start, key)
    }

    /// Get a value by key
    pub fn get_value<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot_idx = self.find(key)?;
        self.slots[slot_idx].entry().map(|(_, v)| v)
    }

    pub fn get_value_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot_idx = self.find(key)?;
        match &mut self.slots[slot_idx] {
            Slot::Occupied(_, v) => Some(v),
            _ => None,
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Removes a key, returning its value. The slot becomes a tombstone and
    /// keeps counting towards [`used_count`](Self::used_count).
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot_idx = self.find(key)?;
        let value = self.slots[slot_idx].take_value()?;
        self.entry_count -= 1;
        self.generation = self.generation.wrapping_add(1);
        Some(value)
    }
}

fn empty_slots<K, V>(capacity: usize) -> Vec<Slot<K, V>> {
    std::iter::repeat_with(|| Slot::Empty)
        .take(capacity)
        .collect()
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for HashedDictionary<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Extend<(K, V)> for HashedDictionary<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.add(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashedDictionary<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashedDictionary<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
