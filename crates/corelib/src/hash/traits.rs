//! Core hash function trait definitions.

use crate::error::Result;
use crate::ring::Position;

/// A hash function places opaque byte values on the ring.
///
/// Hash functions are stateless and thread-safe, allowing concurrent
/// placement without synchronization overhead.
pub trait HashFunction: Send + Sync + 'static {
    /// Computes the 128-bit digest of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hashing`](crate::Error::Hashing) when the digest
    /// cannot be produced. Callers treat this as fatal.
    fn digest(&self, bytes: &[u8]) -> Result<u128>;

    /// Returns the name of this hash function.
    fn name(&self) -> &'static str;

    /// Maps `bytes` to a position in `[0, 1)`.
    ///
    /// Equal inputs always land on the same position.
    fn position(&self, bytes: &[u8]) -> Result<Position> {
        self.digest(bytes).map(Position::from_digest)
    }
}
