use crate::error::{DictError, Result};

/// Slot count used when no capacity is requested. Must be prime.
pub const DEFAULT_CAPACITY: usize = 101;

/// Fraction of slots that may hold live entries before the table grows.
pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.5;

/// Construction parameters for a [`HashedDictionary`](crate::HashedDictionary).
///
/// The requested capacity is a slot count and is rounded up to the next
/// prime. The load factor is the single growth threshold: the table rehashes
/// before an insertion once `len >= max_load_factor * capacity`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableConfig {
    pub initial_capacity: usize,
    pub max_load_factor: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
        }
    }
}

impl TableConfig {
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_max_load_factor(mut self, max_load_factor: f64) -> Self {
        self.max_load_factor = max_load_factor;
        self
    }

    /// Rejects load factors outside `(0, 1)` and a zero capacity.
    pub fn validate(&self) -> Result<()> {
        let lf = self.max_load_factor;
        if !lf.is_finite() || lf <= 0.0 || lf >= 1.0 {
            return Err(DictError::InvalidLoadFactor(lf));
        }
        if self.initial_capacity == 0 {
            return Err(DictError::InvalidCapacity(self.initial_capacity));
        }
        Ok(())
    }
}
