//! Core deterministic primitives.
//!
//! Integer coordinates, typed arena handles, the seeded RNG and the state
//! hasher. Nothing in here knows about creatures or spells.

pub mod coord;
pub mod handle;
pub mod rng;
pub mod hash;

// Re-export core types
pub use coord::{Coord3d, MapCoord, SubtileCoord, COORD_PER_STL};
pub use handle::{Arena, Handle};
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
