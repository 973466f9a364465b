//! Things and Creature Control Blocks
//!
//! Every simulated object is a [`Thing`]. Creatures additionally own a
//! [`CreatureControl`] block holding instance counters, spell slots and
//! movement capabilities.
//!
//! ```text
//!   Arena<Thing>                 Arena<CreatureControl>
//!   ┌────────────┐  control      ┌─────────────────────┐
//!   │ creature   │──────────────▶│ instance counters   │
//!   │            │◀──────────────│ casted_spells [5]   │
//!   └────────────┘  thing        │ spell_flags         │
//!   ┌────────────┐  parent       │ companions/familiars│──┐
//!   │ effect     │──────────────▶└─────────────────────┘  │
//!   └────────────┘◀─────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use bitflags::bitflags;

use crate::config::{CreatureKind, InstanceKind, ShotKind, SpellFlags, SpellKind};
use crate::core::coord::{Coord3d, SubtileCoord};
use crate::core::handle::Handle;
use crate::core::hash::StateHasher;
use crate::game::player::PlayerId;

/// Handle to a thing.
pub type ThingHandle = Handle<Thing>;

/// Handle to a creature control block.
pub type ControlHandle = Handle<CreatureControl>;

/// Spell slots per creature.
pub const CREATURE_MAX_SPELLS_CASTED_AT: usize = 5;

// =============================================================================
// THINGS
// =============================================================================

/// Broad class of a thing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ThingClass {
    /// Creature with a control block
    Creature = 0,
    /// Projectile
    Shot = 1,
    /// Pickable object
    Object = 2,
    /// Visual effect or companion
    Effect = 3,
}

/// Object kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Pile of gold
    GoldPile,
    /// Chicken to eat
    Food,
    /// Spell book
    SpellBook,
}

/// Model of a thing within its class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThingModel {
    /// Creature kind
    Creature(CreatureKind),
    /// Shot kind
    Shot(ShotKind),
    /// Object kind
    Object(ObjectKind),
    /// Effect id
    Effect(u16),
}

bitflags! {
    /// Movement capabilities.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MoveFlags: u8 {
        /// Seeks flying altitude instead of falling
        const FLYING   = 0x01;
        /// Standing on the floor
        const GROUNDED = 0x02;
    }
}

bitflags! {
    /// Axes blocked by geometry on the last move.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct BlockFlags: u8 {
        /// Walled on X
        const X = 0x01;
        /// Walled on Y
        const Y = 0x02;
        /// Walled on Z
        const Z = 0x04;
    }
}

/// A simulated object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thing {
    /// Class
    pub class: ThingClass,
    /// Model within the class
    pub model: ThingModel,
    /// Owner
    pub owner: PlayerId,
    /// Position
    pub pos: Coord3d,
    /// Velocity per turn
    pub velocity: Coord3d,
    /// Acceleration folded into velocity next move
    pub accel: Coord3d,
    /// Collision box against geometry
    pub clipbox_size_xy: i32,
    /// Collision box height against geometry
    pub clipbox_size_yz: i32,
    /// Hit box against other things
    pub solid_size_xy: i32,
    /// Hit box height against other things
    pub solid_size_yz: i32,
    /// Health; lifespan for shots and effects
    pub health: i32,
    /// Shot/spell level
    pub level: u8,
    /// Movement capabilities
    pub move_flags: MoveFlags,
    /// Axes blocked on the last move
    pub blocked: BlockFlags,
    /// Control block of a creature
    pub control: Option<ControlHandle>,
    /// Companion host or shot origin
    pub parent: Option<ThingHandle>,
    /// Offset from the parent for companions
    pub orbit_offset: Coord3d,
    /// Lifted by a keeper's hand
    pub picked_up: bool,
    /// Marked for removal at the end of the turn
    pub doomed: bool,
}

impl Thing {
    /// Bare thing at a position.
    pub fn new(class: ThingClass, model: ThingModel, owner: PlayerId, pos: Coord3d) -> Self {
        Self {
            class,
            model,
            owner,
            pos,
            velocity: Coord3d::ZERO,
            accel: Coord3d::ZERO,
            clipbox_size_xy: 32,
            clipbox_size_yz: 32,
            solid_size_xy: 32,
            solid_size_yz: 32,
            health: 1,
            level: 0,
            move_flags: MoveFlags::empty(),
            blocked: BlockFlags::empty(),
            control: None,
            parent: None,
            orbit_offset: Coord3d::ZERO,
            picked_up: false,
            doomed: false,
        }
    }

    /// Creature class.
    pub fn is_creature(&self) -> bool {
        self.class == ThingClass::Creature
    }

    /// Creature kind, if a creature.
    pub fn creature_kind(&self) -> Option<CreatureKind> {
        match self.model {
            ThingModel::Creature(kind) => Some(kind),
            _ => None,
        }
    }

    /// Shot kind, if a shot.
    pub fn shot_kind(&self) -> Option<ShotKind> {
        match self.model {
            ThingModel::Shot(kind) => Some(kind),
            _ => None,
        }
    }

    /// Flying capability.
    pub fn is_flying(&self) -> bool {
        self.move_flags.contains(MoveFlags::FLYING)
    }

    /// Alive and not queued for removal.
    pub fn is_active(&self) -> bool {
        !self.doomed && self.health > 0
    }

    /// Set both geometry and hit boxes.
    pub fn set_size(&mut self, size_xy: i32, size_yz: i32) {
        self.clipbox_size_xy = size_xy;
        self.clipbox_size_yz = size_yz;
        self.solid_size_xy = size_xy;
        self.solid_size_yz = size_yz;
    }

    /// Hash state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.class as u8);
        hasher.update_u8(self.owner.0);
        hasher.update_coord(self.pos);
        hasher.update_coord(self.velocity);
        hasher.update_i32(self.health);
        hasher.update_u8(self.move_flags.bits());
        hasher.update_bool(self.picked_up);
        hasher.update_bool(self.doomed);
    }
}

// =============================================================================
// CREATURE CONTROL
// =============================================================================

/// One spell slot. `spkind == None` marks a free slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastedSpellData {
    /// Spell occupying the slot
    pub spkind: Option<SpellKind>,
    /// Remaining turns
    pub duration: i32,
    /// Level it was cast at
    pub caster_level: u8,
    /// Who cast it
    pub caster_owner: PlayerId,
}

impl Default for CastedSpellData {
    fn default() -> Self {
        Self {
            spkind: None,
            duration: 0,
            caster_level: 0,
            caster_owner: PlayerId::NEUTRAL,
        }
    }
}

impl CastedSpellData {
    /// Slot holds nothing.
    pub fn is_free(&self) -> bool {
        self.spkind.is_none()
    }
}

/// Who steers the creature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlMode {
    /// Creature AI
    #[default]
    Ai,
    /// Possessed by a keeper
    Direct,
    /// Possessed but the AI drives (keeper rides along)
    Passenger,
}

/// Coarse behaviour state the core forces on creatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CreatureState {
    /// Whatever the AI decides
    #[default]
    Idle,
    /// Running away
    Fleeing,
    /// Cowering after a slap
    Cowering,
    /// Waiting for a teleport
    Teleporting,
    /// Being dragged by another creature
    Dragged,
    /// Knocked out
    Unconscious,
}

/// Target of an instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTarget {
    /// Thing aimed at
    pub thing: Option<ThingHandle>,
    /// Position aimed at
    pub pos: Option<Coord3d>,
}

impl InstanceTarget {
    /// Aim at a thing.
    pub fn thing(thing: ThingHandle) -> Self {
        Self { thing: Some(thing), pos: None }
    }

    /// Aim at a position.
    pub fn at(pos: Coord3d) -> Self {
        Self { thing: None, pos: Some(pos) }
    }
}

/// Extended creature state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatureControl {
    /// Owning thing
    pub thing: ThingHandle,
    /// Kind
    pub kind: CreatureKind,
    /// Experience level
    pub exp_level: u8,

    // Instance
    /// Running instance
    pub instance_id: Option<InstanceKind>,
    /// Turns into the instance
    pub inst_turn: u32,
    /// Scaled total turns
    pub inst_total_turns: u32,
    /// Scaled action turn
    pub inst_action_turns: u32,
    /// Extend by one turn at the end
    pub inst_repeat: bool,
    /// Animation progress per turn
    pub instance_anim_step_turns: i32,
    /// Instance target
    pub target: InstanceTarget,
    /// Turn each instance last fired
    pub instance_use_turn: BTreeMap<InstanceKind, u32>,

    // Spells
    /// Spell slots
    pub casted_spells: [CastedSpellData; CREATURE_MAX_SPELLS_CASTED_AT],
    /// Live status flags
    pub spell_flags: SpellFlags,
    /// Speed cap after status modifiers
    pub max_speed: i32,
    /// Requested speed
    pub move_speed: i32,
    /// Turns the creature cannot hide
    pub force_visible: u32,
    /// Armour lights
    pub armour_lights: Vec<ThingHandle>,
    /// Disease motes
    pub disease_motes: Vec<ThingHandle>,
    /// Summoned familiars
    pub familiars: Vec<ThingHandle>,
    /// Who infected the creature
    pub disease_caster: Option<PlayerId>,
    /// Armed as a time bomb
    pub timebomb_armed: bool,
    /// Turns until a chicken spell completes
    pub chicken_countdown: u32,
    /// Transformed into a chicken
    pub chicken_morphed: bool,
    /// Turn fear started
    pub flee_start_turn: u32,
    /// Teleport in progress
    pub active_teleport_spell: Option<SpellKind>,
    /// Resolved teleport destination
    pub teleport_dest: Option<Coord3d>,
    /// Lair position
    pub lair_pos: Option<Coord3d>,

    // Behaviour
    /// Forced behaviour
    pub state: CreatureState,
    /// Who steers
    pub control_mode: ControlMode,
    /// Fear demoted direct control to passenger
    pub fear_demoted: bool,
    /// Slap speed boost turns
    pub slap_turns: u32,
    /// Cowering turns
    pub cower_turns: u32,
    /// Door hit while flying, for combat logic
    pub collided_door_subtile: Option<SubtileCoord>,
    /// Hand hold turns
    pub stopped_for_hand_turns: u32,
    /// Imprisoning player
    pub custody: Option<PlayerId>,
    /// Walk target
    pub move_target: Option<Coord3d>,
}

impl CreatureControl {
    /// Fresh control block.
    pub fn new(thing: ThingHandle, kind: CreatureKind, exp_level: u8) -> Self {
        Self {
            thing,
            kind,
            exp_level,
            instance_id: None,
            inst_turn: 0,
            inst_total_turns: 0,
            inst_action_turns: 0,
            inst_repeat: false,
            instance_anim_step_turns: 0,
            target: InstanceTarget::default(),
            instance_use_turn: BTreeMap::new(),
            casted_spells: [CastedSpellData::default(); CREATURE_MAX_SPELLS_CASTED_AT],
            spell_flags: SpellFlags::empty(),
            max_speed: 0,
            move_speed: 0,
            force_visible: 0,
            armour_lights: Vec::new(),
            disease_motes: Vec::new(),
            familiars: Vec::new(),
            disease_caster: None,
            timebomb_armed: false,
            chicken_countdown: 0,
            chicken_morphed: false,
            flee_start_turn: 0,
            active_teleport_spell: None,
            teleport_dest: None,
            lair_pos: None,
            state: CreatureState::Idle,
            control_mode: ControlMode::Ai,
            fear_demoted: false,
            slap_turns: 0,
            cower_turns: 0,
            collided_door_subtile: None,
            stopped_for_hand_turns: 0,
            custody: None,
            move_target: None,
        }
    }

    /// Slot index holding a spell.
    pub fn spell_slot(&self, spell: SpellKind) -> Option<usize> {
        self.casted_spells.iter().position(|s| s.spkind == Some(spell))
    }

    /// Number of occupied slots.
    pub fn active_spell_count(&self) -> usize {
        self.casted_spells.iter().filter(|s| !s.is_free()).count()
    }

    /// Status flag set.
    pub fn has_flag(&self, flag: SpellFlags) -> bool {
        self.spell_flags.contains(flag)
    }

    /// Possessed and steering.
    pub fn is_first_person(&self) -> bool {
        self.control_mode == ControlMode::Direct
    }

    /// Held by state: dragged, teleporting or armed.
    pub fn is_bound(&self) -> bool {
        self.state == CreatureState::Dragged
            || self.has_flag(SpellFlags::TELEPORT)
            || self.timebomb_armed
    }

    /// Hash state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.kind as u8);
        hasher.update_u8(self.exp_level);
        hasher.update_opt_u32(self.instance_id.map(|k| k as u32));
        hasher.update_u32(self.inst_turn);
        hasher.update_u32(self.inst_total_turns);
        hasher.update_u32(self.spell_flags.bits());
        hasher.update_i32(self.max_speed);
        for slot in &self.casted_spells {
            hasher.update_opt_u32(slot.spkind.map(|k| k as u32));
            hasher.update_i32(slot.duration);
        }
        hasher.update_u32(self.slap_turns);
        hasher.update_u32(self.armour_lights.len() as u32);
        hasher.update_u32(self.familiars.len() as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_control_has_free_slots() {
        let ctrl = CreatureControl::new(Handle::from_raw(0, 0), CreatureKind::Imp, 0);
        assert_eq!(ctrl.active_spell_count(), 0);
        assert!(ctrl.casted_spells.iter().all(|s| s.is_free()));
        assert_eq!(ctrl.spell_slot(SpellKind::Speed), None);
        assert!(ctrl.instance_id.is_none());
    }

    #[test]
    fn test_bound_states() {
        let mut ctrl = CreatureControl::new(Handle::from_raw(0, 0), CreatureKind::Imp, 0);
        assert!(!ctrl.is_bound());
        ctrl.spell_flags |= SpellFlags::TELEPORT;
        assert!(ctrl.is_bound());
        ctrl.spell_flags = SpellFlags::empty();
        ctrl.timebomb_armed = true;
        assert!(ctrl.is_bound());
    }

    #[test]
    fn test_thing_kinds() {
        let t = Thing::new(
            ThingClass::Shot,
            ThingModel::Shot(ShotKind::Arrow),
            PlayerId(0),
            Coord3d::ZERO,
        );
        assert_eq!(t.shot_kind(), Some(ShotKind::Arrow));
        assert_eq!(t.creature_kind(), None);
        assert!(t.is_active());
    }
}
