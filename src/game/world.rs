//! World State
//!
//! The simulation context threaded through every core entry point: turn
//! counter, RNG, block grid, thing and control arenas, players and the
//! event queue. Configuration is passed alongside, never stored.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::{CreatureKind, GameRules, ShotKind, SimConfig, SpellFlags};
use crate::core::coord::Coord3d;
use crate::core::handle::Arena;
use crate::core::hash::{compute_state_hash, StateHash};
use crate::core::rng::DeterministicRng;
use crate::game::events::GameEvent;
use crate::game::map::MapGrid;
use crate::game::physics::MAX_VELOCITY;
use crate::game::player::{Player, PlayerId, Relation};
use crate::game::thing::{
    CreatureControl, MoveFlags, ObjectKind, Thing, ThingClass, ThingHandle, ThingModel,
};

/// Errors from world storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// Thing arena is full
    #[error("thing limit reached ({capacity})")]
    ThingLimit {
        /// Arena capacity
        capacity: usize,
    },

    /// Control arena is full
    #[error("creature control limit reached ({capacity})")]
    ControlLimit {
        /// Arena capacity
        capacity: usize,
    },

    /// Handle does not refer to a live thing
    #[error("stale thing handle {0:?}")]
    StaleHandle(ThingHandle),

    /// Kind has no configuration row
    #[error("no configuration for {0}")]
    MissingConfig(String),

    /// Snapshot could not be written or read
    #[error("checkpoint: {0}")]
    Checkpoint(String),
}

/// Complete simulation state.
///
/// Arenas iterate in slot order and players in id order, so every
/// traversal is deterministic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct World {
    /// Current game turn
    pub turn: u32,

    /// Deterministic RNG state
    pub rng: DeterministicRng,

    /// Block grid
    pub map: MapGrid,

    /// All things
    pub things: Arena<Thing>,

    /// Creature control blocks
    pub controls: Arena<CreatureControl>,

    /// Players by id
    pub players: BTreeMap<PlayerId, Player>,

    /// Events generated since the last drain
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl World {
    /// Create an empty world.
    pub fn new(map: MapGrid, rules: &GameRules, seed: u64) -> Self {
        Self {
            turn: 0,
            rng: DeterministicRng::new(seed),
            map,
            things: Arena::with_capacity(rules.max_things),
            controls: Arena::with_capacity(rules.max_controls),
            players: BTreeMap::new(),
            pending_events: Vec::new(),
        }
    }

    // =========================================================================
    // Players
    // =========================================================================

    /// Add (or reset) a player.
    pub fn add_player(&mut self, id: PlayerId) -> &mut Player {
        let slot = self.players.entry(id).or_insert_with(|| Player::new(id));
        *slot = Player::new(id);
        slot
    }

    /// Player by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Player by id, mutably.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// How `caster` sees things owned by `owner`.
    pub fn relation(&self, caster: PlayerId, owner: PlayerId) -> Relation {
        match self.player(caster) {
            Some(player) => player.relation_to(owner),
            None if owner == caster => Relation::Owned,
            None if owner.is_neutral() => Relation::Neutral,
            None => Relation::Enemy,
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Thing by handle.
    pub fn thing(&self, h: ThingHandle) -> Option<&Thing> {
        self.things.get(h)
    }

    /// Thing by handle, mutably.
    pub fn thing_mut(&mut self, h: ThingHandle) -> Option<&mut Thing> {
        self.things.get_mut(h)
    }

    /// Control block of a creature.
    pub fn control(&self, h: ThingHandle) -> Option<&CreatureControl> {
        let ch = self.things.get(h)?.control?;
        self.controls.get(ch)
    }

    /// Control block of a creature, mutably.
    pub fn control_mut(&mut self, h: ThingHandle) -> Option<&mut CreatureControl> {
        let ch = self.things.get(h)?.control?;
        self.controls.get_mut(ch)
    }

    /// Thing and control block together.
    pub fn creature_mut(&mut self, h: ThingHandle) -> Option<(&mut Thing, &mut CreatureControl)> {
        let thing = self.things.get_mut(h)?;
        let ch = thing.control?;
        let ctrl = self.controls.get_mut(ch)?;
        Some((thing, ctrl))
    }

    /// Live creature that is not queued for removal.
    pub fn is_active_creature(&self, h: ThingHandle) -> bool {
        self.things
            .get(h)
            .map(|t| t.is_creature() && t.is_active() && t.control.is_some())
            .unwrap_or(false)
    }

    /// Handles of all creatures, in slot order.
    pub fn creatures(&self) -> Vec<ThingHandle> {
        self.things
            .iter()
            .filter(|(_, t)| t.is_creature())
            .map(|(h, _)| h)
            .collect()
    }

    /// Active creatures whose feet are within `radius` of `pos` on the XY plane.
    pub fn creatures_near(&self, pos: Coord3d, radius: i32) -> Vec<ThingHandle> {
        let r2 = radius as i64 * radius as i64;
        self.things
            .iter()
            .filter(|(_, t)| t.is_creature() && t.is_active() && !t.picked_up)
            .filter(|(_, t)| t.pos.distance_xy_squared(pos) <= r2)
            .map(|(h, _)| h)
            .collect()
    }

    /// Count an owner's creatures matching a predicate.
    pub fn count_creatures<F>(&self, owner: PlayerId, mut pred: F) -> usize
    where
        F: FnMut(&CreatureControl) -> bool,
    {
        self.things
            .iter()
            .filter(|(_, t)| t.is_creature() && t.owner == owner && t.is_active())
            .filter_map(|(_, t)| t.control.and_then(|ch| self.controls.get(ch)))
            .filter(|c| pred(*c))
            .count()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Store a prepared thing.
    pub fn spawn_thing(&mut self, thing: Thing) -> Result<ThingHandle, WorldError> {
        match self.things.insert(thing) {
            Some(h) => Ok(h),
            None => {
                error!("thing limit reached ({}), refusing creation", self.things.capacity());
                Err(WorldError::ThingLimit { capacity: self.things.capacity() })
            }
        }
    }

    /// Create a creature with its control block.
    pub fn create_creature(
        &mut self,
        cfg: &SimConfig,
        kind: CreatureKind,
        owner: PlayerId,
        pos: Coord3d,
        exp_level: u8,
    ) -> Result<ThingHandle, WorldError> {
        let stats = cfg
            .creature(kind)
            .ok_or_else(|| WorldError::MissingConfig(format!("creature {:?}", kind)))?;

        let mut thing = Thing::new(ThingClass::Creature, ThingModel::Creature(kind), owner, pos);
        thing.set_size(stats.size_xy, stats.size_yz);
        thing.health = stats.max_health(exp_level);
        if stats.flying {
            thing.move_flags |= MoveFlags::FLYING;
        }
        let h = self.spawn_thing(thing)?;

        let mut ctrl = CreatureControl::new(h, kind, exp_level);
        if stats.illuminated {
            ctrl.spell_flags |= SpellFlags::LIGHT;
        }
        let Some(ch) = self.controls.insert(ctrl) else {
            self.things.remove(h);
            error!("no free creature control slot, refusing {:?}", kind);
            return Err(WorldError::ControlLimit { capacity: self.controls.capacity() });
        };
        if let Some(thing) = self.things.get_mut(h) {
            thing.control = Some(ch);
        }
        self.recalculate_max_speed(cfg, h);
        debug!("created {:?} {:?} for player {}", kind, h, owner.0);
        Ok(h)
    }

    /// Create a projectile.
    #[allow(clippy::too_many_arguments)]
    pub fn create_shot(
        &mut self,
        cfg: &SimConfig,
        kind: ShotKind,
        owner: PlayerId,
        parent: Option<ThingHandle>,
        pos: Coord3d,
        velocity: Coord3d,
        level: u8,
    ) -> Result<ThingHandle, WorldError> {
        let shot = cfg
            .shot(kind)
            .ok_or_else(|| WorldError::MissingConfig(format!("shot {:?}", kind)))?;
        let mut thing = Thing::new(ThingClass::Shot, ThingModel::Shot(kind), owner, pos);
        thing.set_size(shot.size_xy, shot.size_yz);
        thing.health = shot.health.max(1);
        thing.velocity = velocity;
        thing.parent = parent;
        thing.level = level;
        self.spawn_thing(thing)
    }

    /// Create an object.
    pub fn create_object(&mut self, kind: ObjectKind, owner: PlayerId, pos: Coord3d) -> Result<ThingHandle, WorldError> {
        let thing = Thing::new(ThingClass::Object, ThingModel::Object(kind), owner, pos);
        self.spawn_thing(thing)
    }

    /// Create a short-lived visual effect.
    pub fn create_effect(&mut self, effect: u16, pos: Coord3d, lifespan: i32) -> Result<ThingHandle, WorldError> {
        let mut thing = Thing::new(ThingClass::Effect, ThingModel::Effect(effect), PlayerId::NEUTRAL, pos);
        thing.health = lifespan.max(1);
        let h = self.spawn_thing(thing)?;
        self.push_event(GameEvent::effect(self.turn, effect, pos));
        Ok(h)
    }

    /// Create an effect that follows a host until removed.
    pub fn create_companion(&mut self, host: ThingHandle, effect: u16, offset: Coord3d) -> Result<ThingHandle, WorldError> {
        let host_thing = self.things.get(host).ok_or(WorldError::StaleHandle(host))?;
        let mut thing = Thing::new(
            ThingClass::Effect,
            ThingModel::Effect(effect),
            host_thing.owner,
            host_thing.pos + offset,
        );
        thing.parent = Some(host);
        thing.orbit_offset = offset;
        self.spawn_thing(thing)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove a thing with full teardown.
    ///
    /// Creatures lose every spell (companions included), their familiars,
    /// possession and hand links before their slots are recycled.
    pub fn kill_thing(&mut self, cfg: &SimConfig, h: ThingHandle) -> bool {
        let Some(thing) = self.things.get(h) else {
            return false;
        };
        let class = thing.class;
        let owner = thing.owner;
        let control = thing.control;

        if class == ThingClass::Creature {
            crate::game::spell::terminate_all_spells(self, cfg, h);
            let leftovers = self.control_mut(h).map(|ctrl| {
                let mut v = std::mem::take(&mut ctrl.familiars);
                v.append(&mut ctrl.armour_lights);
                v.append(&mut ctrl.disease_motes);
                v
            });
            for other in leftovers.unwrap_or_default() {
                self.kill_thing(cfg, other);
            }
            for player in self.players.values_mut() {
                if player.controlled_thing == Some(h) {
                    player.controlled_thing = None;
                }
                player.hand.retain(|held| *held != h);
            }
            if let Some(ch) = control {
                self.controls.remove(ch);
            }
        }

        let orphans: Vec<ThingHandle> = self
            .things
            .iter()
            .filter(|(_, t)| t.class == ThingClass::Effect && t.parent == Some(h))
            .map(|(oh, _)| oh)
            .collect();
        for orphan in orphans {
            self.things.remove(orphan);
        }

        self.things.remove(h);
        self.push_event(GameEvent::thing_killed(self.turn, h, class, owner));
        true
    }

    // =========================================================================
    // Health and speed
    // =========================================================================

    /// Max health of a creature.
    pub fn max_health(&self, cfg: &SimConfig, h: ThingHandle) -> i32 {
        self.control(h)
            .and_then(|ctrl| cfg.creature(ctrl.kind).map(|s| s.max_health(ctrl.exp_level)))
            .unwrap_or(0)
    }

    /// Deal damage; armour halves it. Returns damage taken.
    pub fn damage_thing(&mut self, h: ThingHandle, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let armoured = self
            .control(h)
            .map(|c| c.has_flag(SpellFlags::ARMOUR))
            .unwrap_or(false);
        let dealt = if armoured { (amount + 1) / 2 } else { amount };
        match self.things.get_mut(h) {
            Some(thing) => {
                thing.health -= dealt;
                dealt
            }
            None => 0,
        }
    }

    /// Heal a creature up to its max health. Returns health gained.
    pub fn heal_creature(&mut self, cfg: &SimConfig, h: ThingHandle, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let max = self.max_health(cfg, h);
        match self.things.get_mut(h) {
            Some(thing) if thing.health < max => {
                let before = thing.health;
                thing.health = (thing.health + amount).min(max);
                thing.health - before
            }
            _ => 0,
        }
    }

    /// Recompute `max_speed` from base speed and status modifiers.
    pub fn recalculate_max_speed(&mut self, cfg: &SimConfig, h: ThingHandle) {
        let Some(thing) = self.things.get(h) else {
            return;
        };
        let obey = self.player(thing.owner).map(|p| p.must_obey).unwrap_or(false);
        let Some((_, ctrl)) = self.creature_mut(h) else {
            return;
        };
        let base = cfg.creature(ctrl.kind).map(|s| s.base_speed).unwrap_or(0);

        let mut speed = base;
        if ctrl.slap_turns > 0 {
            speed *= 2;
        }
        if ctrl.has_flag(SpellFlags::SPEED) {
            speed *= 2;
        }
        if ctrl.has_flag(SpellFlags::SLOW) {
            speed /= 2;
        }
        if obey {
            speed = speed * 5 / 4;
        }
        if ctrl.has_flag(SpellFlags::FREEZE) {
            speed = 0;
        }
        ctrl.max_speed = speed.clamp(0, MAX_VELOCITY);
        ctrl.move_speed = ctrl.move_speed.min(ctrl.max_speed);
    }

    // =========================================================================
    // Events, hashing, snapshots
    // =========================================================================

    /// Queue an event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Hash of the full simulation state.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.turn, self.rng.state(), |hasher| {
            for (h, thing) in self.things.iter() {
                hasher.update_u32(h.index());
                hasher.update_u32(h.generation());
                thing.hash_into(hasher);
            }
            for (_, ctrl) in self.controls.iter() {
                ctrl.hash_into(hasher);
            }
            for player in self.players.values() {
                player.hash_into(hasher);
            }
            for (stl, block) in self.map.blocks() {
                if block.slab.is_ground() || block.owner.is_some() {
                    hasher.update_i32(stl.x);
                    hasher.update_i32(stl.y);
                    hasher.update_u8(block.slab as u8);
                    hasher.update_u8(block.owner.map(|p| p.0).unwrap_or(u8::MAX));
                }
            }
        })
    }

    /// Serialize the full state.
    pub fn checkpoint(&self) -> Result<Vec<u8>, WorldError> {
        bincode::serialize(self).map_err(|e| WorldError::Checkpoint(e.to_string()))
    }

    /// Restore a state produced by [`World::checkpoint`].
    pub fn from_checkpoint(bytes: &[u8]) -> Result<Self, WorldError> {
        bincode::deserialize(bytes).map_err(|e| WorldError::Checkpoint(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coord::SubtileCoord;
    use crate::game::map::SlabKind;

    fn world() -> (World, SimConfig) {
        let cfg = SimConfig::default();
        let mut world = World::new(MapGrid::new(5, 5, SlabKind::Path), &cfg.rules, 7);
        world.add_player(PlayerId(0));
        world.add_player(PlayerId(1));
        (world, cfg)
    }

    #[test]
    fn test_create_creature_sets_up_control() {
        let (mut world, cfg) = world();
        let pos = SubtileCoord::new(4, 4).center(0);
        let h = world.create_creature(&cfg, CreatureKind::Fairy, PlayerId(0), pos, 0).unwrap();

        let thing = world.thing(h).unwrap();
        assert!(thing.is_flying());
        assert_eq!(thing.health, 250);
        let ctrl = world.control(h).unwrap();
        assert_eq!(ctrl.thing, h);
        assert_eq!(ctrl.max_speed, 40);
    }

    #[test]
    fn test_innate_light() {
        let (mut world, cfg) = world();
        let pos = SubtileCoord::new(4, 4).center(0);
        let h = world.create_creature(&cfg, CreatureKind::Dragon, PlayerId(0), pos, 0).unwrap();
        assert!(world.control(h).unwrap().has_flag(SpellFlags::LIGHT));
    }

    #[test]
    fn test_control_exhaustion_refuses_creature() {
        let mut cfg = SimConfig::default();
        cfg.rules.max_controls = 1;
        let mut world = World::new(MapGrid::new(3, 3, SlabKind::Path), &cfg.rules, 1);
        let pos = SubtileCoord::new(4, 4).center(0);
        world.create_creature(&cfg, CreatureKind::Imp, PlayerId(0), pos, 0).unwrap();
        let err = world.create_creature(&cfg, CreatureKind::Imp, PlayerId(0), pos, 0);
        assert_eq!(err, Err(WorldError::ControlLimit { capacity: 1 }));
        // The half-built thing was released
        assert_eq!(world.things.len(), 1);
    }

    #[test]
    fn test_kill_releases_handles() {
        let (mut world, cfg) = world();
        let pos = SubtileCoord::new(4, 4).center(0);
        let h = world.create_creature(&cfg, CreatureKind::Imp, PlayerId(0), pos, 0).unwrap();
        let light = world.create_companion(h, 1, Coord3d::new(64, 0, 0)).unwrap();
        world.player_mut(PlayerId(0)).unwrap().controlled_thing = Some(h);

        assert!(world.kill_thing(&cfg, h));
        assert!(world.thing(h).is_none());
        assert!(world.thing(light).is_none());
        assert!(world.controls.is_empty());
        assert_eq!(world.player(PlayerId(0)).unwrap().controlled_thing, None);
        assert!(!world.kill_thing(&cfg, h));
    }

    #[test]
    fn test_armour_halves_damage() {
        let (mut world, cfg) = world();
        let pos = SubtileCoord::new(4, 4).center(0);
        let h = world.create_creature(&cfg, CreatureKind::Dwarf, PlayerId(0), pos, 0).unwrap();
        assert_eq!(world.damage_thing(h, 10), 10);
        world.control_mut(h).unwrap().spell_flags |= SpellFlags::ARMOUR;
        assert_eq!(world.damage_thing(h, 10), 5);
        assert_eq!(world.thing(h).unwrap().health, 235);
        assert_eq!(world.heal_creature(&cfg, h, 100), 15);
    }

    #[test]
    fn test_max_speed_modifiers() {
        let (mut world, cfg) = world();
        let pos = SubtileCoord::new(4, 4).center(0);
        let h = world.create_creature(&cfg, CreatureKind::Imp, PlayerId(0), pos, 0).unwrap();
        assert_eq!(world.control(h).unwrap().max_speed, 48);

        world.control_mut(h).unwrap().slap_turns = 5;
        world.recalculate_max_speed(&cfg, h);
        assert_eq!(world.control(h).unwrap().max_speed, 96);

        world.player_mut(PlayerId(0)).unwrap().must_obey = true;
        world.recalculate_max_speed(&cfg, h);
        assert_eq!(world.control(h).unwrap().max_speed, 120);

        world.control_mut(h).unwrap().spell_flags |= SpellFlags::FREEZE;
        world.recalculate_max_speed(&cfg, h);
        assert_eq!(world.control(h).unwrap().max_speed, 0);
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let (mut world, cfg) = world();
        let pos = SubtileCoord::new(4, 4).center(0);
        world.create_creature(&cfg, CreatureKind::Warlock, PlayerId(1), pos, 2).unwrap();
        world.rng.next_u64();

        let bytes = world.checkpoint().unwrap();
        let back = World::from_checkpoint(&bytes).unwrap();
        assert_eq!(back.compute_hash(), world.compute_hash());
    }

    #[test]
    fn test_hash_tracks_changes() {
        let (mut world, cfg) = world();
        let pos = SubtileCoord::new(4, 4).center(0);
        let h = world.create_creature(&cfg, CreatureKind::Imp, PlayerId(0), pos, 0).unwrap();
        let before = world.compute_hash();
        world.thing_mut(h).unwrap().pos.x += 1;
        assert_ne!(before, world.compute_hash());
    }
}
