//! # Dungeon Simulation Core
//!
//! Deterministic per-creature simulation for a dungeon-keeper style game:
//! instance execution, spell effects, physics, power casting and a
//! delta-encoded state sync codec.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DUNGEON SIM CORE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── coord.rs    - Map coordinates and subtiles              │
//! │  ├── handle.rs   - Generation-counted handles and arenas     │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  config/         - Read-only tables                          │
//! │  ├── instance.rs - Creature instances                        │
//! │  ├── magic.rs    - Spells, shots and powers                  │
//! │  └── creature.rs - Creature stats                            │
//! │                                                              │
//! │  game/           - Simulation (deterministic)                │
//! │  ├── world.rs    - Things, control blocks, players, map      │
//! │  ├── physics.rs  - Movement and wall collision               │
//! │  ├── instance.rs - Instance state machine                    │
//! │  ├── spell.rs    - Spell slots and effects                   │
//! │  ├── cast.rs     - Cast validation and dispatch              │
//! │  └── tick.rs     - Turn pipeline                             │
//! │                                                              │
//! │  sync/           - State sync                                │
//! │  ├── codec.rs    - Delta-encoded collect/restore             │
//! │  ├── channel.rs  - Stateful sender/receiver                  │
//! │  └── display.rs  - Display snapshot                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - Integer arithmetic only
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from the world's seeded Xorshift128+
//!
//! Given identical configuration, seed and commands, every peer reaches
//! an identical state hash on every turn.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod config;
pub mod game;
pub mod sync;

// Re-export commonly used types
pub use core::coord::{Coord3d, SubtileCoord, COORD_PER_STL};
pub use core::rng::DeterministicRng;
pub use config::SimConfig;
pub use game::world::World;
pub use game::player::PlayerId;
pub use game::tick::{tick, TickResult};
pub use sync::channel::SyncChannel;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Game turns per second
pub const TURNS_PER_SECOND: u32 = 20;
