//! XXH3 hash function implementation.

use crate::error::Result;
use crate::hash::traits::HashFunction;
use xxhash_rust::xxh3::xxh3_128;

/// XXH3-128 hash function (the default).
#[derive(Clone, Copy, Debug, Default)]
pub struct Xxh3Hasher;

impl HashFunction for Xxh3Hasher {
    fn digest(&self, bytes: &[u8]) -> Result<u128> {
        Ok(xxh3_128(bytes))
    }

    fn name(&self) -> &'static str {
        "xxh3"
    }
}
