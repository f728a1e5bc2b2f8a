//! BLAKE3 hash function implementation.

use crate::error::Result;
use crate::hash::traits::HashFunction;

/// BLAKE3 truncated to its first 128 bits.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Hasher;

impl HashFunction for Blake3Hasher {
    fn digest(&self, bytes: &[u8]) -> Result<u128> {
        let hash = ::blake3::hash(bytes);
        let mut head = [0u8; 16];
        head.copy_from_slice(&hash.as_bytes()[..16]);
        Ok(u128::from_be_bytes(head))
    }

    fn name(&self) -> &'static str {
        "blake3"
    }
}
