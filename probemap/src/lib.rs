//! An open address dictionary with linear probing, tombstone deletion and
//! prime-sized doubling growth, plus a replay-based snapshot format.
//!
//! ```
//! use probemap::HashedDictionary;
//!
//! let mut dict = HashedDictionary::with_capacity(11);
//! assert_eq!(dict.add(5, "hello"), None);
//! assert_eq!(dict.add(5, "world"), Some("hello"));
//! assert_eq!(dict.get_value(&5), Some(&"world"));
//! assert_eq!(dict.remove(&5), Some("world"));
//! assert_eq!(dict.get_value(&5), None);
//! ```

pub mod config;
pub mod error;
pub mod iter;
mod prime;
mod probe;
mod slot;
pub mod snapshot;
mod table;
pub mod types;

pub use config::{DEFAULT_CAPACITY, DEFAULT_MAX_LOAD_FACTOR, TableConfig};
pub use error::{DictError, Result};
pub use iter::{Iter, KeyCursor, Keys, Values};
pub use table::HashedDictionary;
pub use types::{Bytes, BytesDecode, BytesEncode, Native, Str};
