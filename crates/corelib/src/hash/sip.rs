//! SipHash-1-3 hash function implementation.

use crate::error::Result;
use crate::hash::traits::HashFunction;
use siphasher::sip128::{Hasher128, SipHasher13};
use std::hash::Hasher;

/// 128-bit SipHash-1-3 with the all-zero key.
#[derive(Clone, Copy, Debug, Default)]
pub struct SipHasher;

impl HashFunction for SipHasher {
    fn digest(&self, bytes: &[u8]) -> Result<u128> {
        let mut hasher = SipHasher13::new();
        hasher.write(bytes);
        Ok(hasher.finish128().as_u128())
    }

    fn name(&self) -> &'static str {
        "sip"
    }
}
