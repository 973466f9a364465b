//! Game Logic Module
//!
//! All simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `map`: Subtile block grid, slabs, reveal masks
//! - `thing`: Things, creature control blocks, spell slots
//! - `player`: Players, relations, power cooldowns
//! - `world`: Arena-backed world state, creation and teardown
//! - `events`: Game events for display and verification
//! - `physics`: Per-turn movement and wall collision
//! - `instance`: Creature instance state machine
//! - `spell`: Spell slots, ticking and termination
//! - `effects`: Status flag side effects
//! - `cast`: Cast validation, pricing and dispatch
//! - `powers`: Power effect producers
//! - `script`: Host hooks for scripted actions
//! - `tick`: Turn pipeline

pub mod map;
pub mod thing;
pub mod player;
pub mod world;
pub mod events;
pub mod physics;
pub mod instance;
pub mod spell;
pub mod effects;
pub mod cast;
pub mod powers;
pub mod script;
pub mod tick;

// Re-export key types
pub use map::{MapGrid, SlabKind};
pub use thing::{CreatureControl, InstanceTarget, Thing, ThingClass, ThingHandle};
pub use player::{Player, PlayerId, Relation};
pub use world::{World, WorldError};
pub use events::{GameEvent, GameEventData};
pub use cast::{magic_use_power, CastError, CastModFlags, CastTarget};
pub use script::{NoScripts, ScriptHost};
pub use tick::{tick, TickResult};
