//! Byte codecs used to write keys and values into snapshot files.

use std::borrow::Cow;
use std::marker::PhantomData;

use crate::error::{DictError, Result};

/// Trait for encoding types into byte representation
pub trait BytesEncode {
    type EItem: ?Sized;

    /// Encode an item into bytes
    fn bytes_encode(item: &Self::EItem) -> Result<Cow<'_, [u8]>>;
}

/// Trait for decoding types from byte representation
pub trait BytesDecode {
    type DItem;

    /// Decode bytes into an owned item
    fn bytes_decode(bytes: &[u8]) -> Result<Self::DItem>;
}

/// Codec for plain old data (numbers, fixed arrays, ...), stored in native
/// byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Native<T>(PhantomData<T>);

impl<T> Default for Native<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

/// Codec for UTF-8 strings, decoding to `String`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Str;

/// Codec for raw byte strings, decoding to `Vec<u8>`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bytes;

impl<T: bytemuck::Pod> BytesEncode for Native<T> {
    type EItem = T;

    fn bytes_encode(item: &Self::EItem) -> Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(bytemuck::bytes_of(item)))
    }
}

impl<T: bytemuck::Pod> BytesDecode for Native<T> {
    type DItem = T;

    fn bytes_decode(bytes: &[u8]) -> Result<Self::DItem> {
        if bytes.len() != std::mem::size_of::<T>() {
            return Err(DictError::Decoding(format!(
                "Invalid byte length for {}: expected {}, got {}",
                std::any::type_name::<T>(),
                std::mem::size_of::<T>(),
                bytes.len()
            )));
        }
        // snapshot payloads carry no alignment guarantee
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}

impl BytesEncode for Str {
    type EItem = str;

    fn bytes_encode(item: &Self::EItem) -> Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(item.as_bytes()))
    }
}

impl BytesDecode for Str {
    type DItem = String;

    fn bytes_decode(bytes: &[u8]) -> Result<Self::DItem> {
        std::str::from_utf8(bytes)
            .map(|s| s.to_owned())
            .map_err(|e| DictError::Decoding(e.to_string()))
    }
}

impl BytesEncode for Bytes {
    type EItem = [u8];

    fn bytes_encode(item: &Self::EItem) -> Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(item))
    }
}

impl BytesDecode for Bytes {
    type DItem = Vec<u8>;

    fn bytes_decode(bytes: &[u8]) -> Result<Self::DItem> {
        Ok(bytes.to_vec())
    }
}
