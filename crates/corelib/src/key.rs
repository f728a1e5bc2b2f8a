//! Opaque cache keys and values.
//!
//! Keys are compared, hashed and placed on the ring purely by their bytes.
//! An empty key stands for "no key" and is rejected wherever a key is
//! required; likewise an empty [`Value`] is treated as a missing value.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// Cached value. Opaque to the ring.
pub type Value = Bytes;

/// Cache key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Key(Bytes);

impl Key {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Builds a key from any serializable value using its bincode encoding.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        bincode::serialize(value)
            .map(|bytes| Self(Bytes::from(bytes)))
            .map_err(|e| Error::Hashing(format!("cannot serialize key: {}", e)))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<&[u8]> for Key {
    fn from(b: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Key {
    fn from(b: Vec<u8>) -> Self {
        Self(Bytes::from(b))
    }
}

impl From<Bytes> for Key {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

macro_rules! key_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(n: $t) -> Self {
                    Self(Bytes::copy_from_slice(&n.to_be_bytes()))
                }
            }
        )*
    };
}

key_from_int!(i32, i64, u32, u64);
