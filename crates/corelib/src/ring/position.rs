//! Ring position implementation.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Number of distinct slots a digest is reduced to before scaling into `[0, 1)`.
pub const RING_RESOLUTION: u128 = 1_000_000;

/// A position on the consistent hash ring, always in `[0, 1)`.
///
/// Positions are totally ordered so they can be sorted and binary searched.
#[derive(Clone, Copy, Default)]
pub struct Position(f64);

impl Position {
    /// Creates a position from a raw value.
    ///
    /// Returns `None` unless `value` lies in `[0, 1)`.
    pub fn new(value: f64) -> Option<Self> {
        (0.0..1.0).contains(&value).then_some(Self(value))
    }

    /// Reduces a digest modulo [`RING_RESOLUTION`] and scales it into `[0, 1)`.
    pub fn from_digest(digest: u128) -> Self {
        Self((digest % RING_RESOLUTION) as f64 / RING_RESOLUTION as f64)
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Absolute distance between two positions (no wraparound).
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        (self.0 - other.0).abs()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({:.6})", self.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}
