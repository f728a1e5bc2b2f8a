//! Consistent hash ring implementation.
//!
//! The ring keeps virtual node positions sorted and answers which node owns
//! a given position.

pub mod index;
pub mod position;

pub use index::{closest_index, RingIndex};
pub use position::{Position, RING_RESOLUTION};
