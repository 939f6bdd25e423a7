use std::io;
use thiserror::Error;

/// Errors reported by the dictionary, its cursors and its snapshot files.
///
/// A missing key is not an error: lookups and removals return `Option`.
#[derive(Error, Debug)]
pub enum DictError {
    /// A key was requested from a cursor that has already yielded every entry
    #[error("no keys left to iterate")]
    IterationExhausted,

    /// The table changed structurally after the cursor was created, or is a
    /// table of another size
    #[error("dictionary was modified during iteration (generation {expected}, now {found})")]
    IteratorInvalidated { expected: u64, found: u64 },

    #[error("max load factor must be in (0, 1), got {0}")]
    InvalidLoadFactor(f64),

    #[error("initial capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    /// IO errors when reading or writing snapshot files
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Encoding errors when converting keys or values to bytes
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Decoding errors when converting bytes back to keys or values
    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

pub type Result<T> = std::result::Result<T, DictError>;
