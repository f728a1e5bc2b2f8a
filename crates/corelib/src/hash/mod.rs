//! Hash functions for consistent hashing.
//!
//! A hash function turns keys and node labels into positions in `[0, 1)`
//! that can be placed on the hash ring.

pub mod blake3;
pub mod sip;
pub mod traits;
pub mod xxh3;

pub use self::blake3::Blake3Hasher;
pub use sip::SipHasher;
pub use traits::HashFunction;
pub use xxh3::Xxh3Hasher;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Selects one of the bundled hash functions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Xxh3,
    Blake3,
    Sip,
}

impl HashAlgorithm {
    /// Builds a shareable instance of the selected hash function.
    pub fn hasher(self) -> Arc<dyn HashFunction> {
        match self {
            HashAlgorithm::Xxh3 => Arc::new(Xxh3Hasher),
            HashAlgorithm::Blake3 => Arc::new(Blake3Hasher),
            HashAlgorithm::Sip => Arc::new(SipHasher),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlgorithm::Xxh3 => "xxh3",
            HashAlgorithm::Blake3 => "blake3",
            HashAlgorithm::Sip => "sip",
        };
        f.write_str(name)
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xxh3" => Ok(HashAlgorithm::Xxh3),
            "blake3" => Ok(HashAlgorithm::Blake3),
            "sip" => Ok(HashAlgorithm::Sip),
            other => Err(Error::invalid(format!("unknown hash algorithm: {}", other))),
        }
    }
}
