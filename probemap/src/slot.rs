/// A single cell of the backing array.
///
/// A slot starts `Empty`, becomes `Occupied` on insertion and `Removed` on
/// deletion. A `Removed` slot keeps its key but every walk disregards it; it
/// can be reused by a later insertion, and only a rehash turns it back into
/// a fresh `Empty` slot (by discarding the whole array).
#[derive(Debug, Clone)]
pub enum Slot<K, V> {
    Empty,
    Occupied(K, V),
    Removed(K),
}

impl<K, V> Default for Slot<K, V> {
    fn default() -> Self {
        Slot::Empty
    }
}

impl<K, V> Slot<K, V> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    /// The key of a live entry, `None` for empty slots and tombstones.
    pub fn key(&self) -> Option<&K> {
        match self {
            Slot::Occupied(k, _) => Some(k),
            _ => None,
        }
    }

    pub fn entry(&self) -> Option<(&K, &V)> {
        match self {
            Slot::Occupied(k, v) => Some((k, v)),
            _ => None,
        }
    }

    /// Turns an occupied slot into a tombstone and hands back its value.
    ///
    /// Leaves any other slot untouched and returns `None`.
    pub fn take_value(&mut self) -> Option<V> {
        match std::mem::replace(self, Slot::Empty) {
            Slot::Occupied(k, v) => {
                *self = Slot::Removed(k);
                Some(v)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn into_entry(self) -> Option<(K, V)> {
        match self {
            Slot::Occupied(k, v) => Some((k, v)),
            _ => None,
        }
    }
}
