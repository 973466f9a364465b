//! Spell Engine
//!
//! Applies spells to creatures, owns their five spell slots and ticks
//! them once per turn.
//!
//! ```text
//!   apply ──▶ cleanse ──▶ one-shot pulse ──▶ immunity ──▶ slot?
//!                                                       │
//!                               same spell in a slot ◀──┴──▶ free slot
//!                               (reapply in place)          (evict weakest)
//!
//!   tick, per slot: flags gone? ──▶ aura ──▶ pulse ──▶ teleport ──▶ duration-1
//! ```

use tracing::{debug, error, warn};

use crate::config::{CreatureKind, DamageMode, SimConfig, SpellConfig, SpellFlags, SpellKind, SPELL_MAX_LEVEL};
use crate::core::coord::Coord3d;
use crate::game::effects::{clear_spell_flags, set_spell_flags, FlagContext};
use crate::game::events::{EventPriority, GameEvent, GameEventData};
use crate::game::physics::find_nearest_free_position;
use crate::game::player::{PlayerId, TeleportDestination};
use crate::game::thing::{CastedSpellData, CreatureState, ThingHandle, CREATURE_MAX_SPELLS_CASTED_AT};
use crate::game::world::World;

/// Familiars appear within this many map units of their host on each axis.
const FAMILIAR_SPREAD: i32 = 128;

/// Result of [`apply_spell`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpellOutcome {
    /// Took a new slot
    Applied,
    /// Refreshed an existing slot
    Reapplied,
    /// Took effect on the spot, no slot
    Instant,
    /// Only removed other effects
    Cleansed,
    /// Target is immune
    Immune,
    /// Target has no control block
    NoControl,
    /// Spell has no configuration row
    Unknown,
}

impl SpellOutcome {
    /// Spell reached the target in some form.
    pub fn landed(self) -> bool {
        matches!(self, Self::Applied | Self::Reapplied | Self::Instant | Self::Cleansed)
    }
}

// =============================================================================
// DURATION AND AMOUNTS
// =============================================================================

/// Full duration of a spell at a level.
///
/// The spell's own duration wins, then the linked power's fixed duration,
/// then the power's strength at that level.
pub fn spell_duration(cfg: &SimConfig, spell: SpellKind, level: u8) -> i32 {
    let Some(spconf) = cfg.spell(spell) else {
        return 0;
    };
    if spconf.duration > 0 {
        return spconf.duration;
    }
    let level = level.min(SPELL_MAX_LEVEL) as usize;
    match spconf.linked_power.and_then(|p| cfg.power(p)) {
        Some(power) if power.duration > 0 => power.duration,
        Some(power) => power.strength[level],
        None => 0,
    }
}

/// Healing of a spell at a level: the linked power's strength, else the
/// spell's fixed healing.
pub fn spell_heal_amount(cfg: &SimConfig, spell: SpellKind, level: u8) -> i32 {
    let Some(spconf) = cfg.spell(spell) else {
        return 0;
    };
    let level = level.min(SPELL_MAX_LEVEL) as usize;
    match spconf.linked_power.and_then(|p| cfg.power(p)) {
        Some(power) if power.strength[level] > 0 => power.strength[level],
        _ => spconf.healing,
    }
}

fn pulse_amount(world: &World, cfg: &SimConfig, h: ThingHandle, spconf: &SpellConfig, level: u8) -> i32 {
    let health = world.thing(h).map(|t| t.health).unwrap_or(0);
    let reference = match spconf.damage_mode {
        DamageMode::Fixed => return spconf.damage,
        DamageMode::LevelScaled => return spconf.damage * (level as i32 + 1),
        DamageMode::PercentMaxHealth => world.max_health(cfg, h),
        DamageMode::PercentCurrentHealth => health,
    };
    let amount = reference * spconf.damage / 100;
    let amount = if amount == 0 { spconf.damage.signum() } else { amount };
    amount.clamp(-reference.abs(), reference.abs())
}

fn apply_pulse(world: &mut World, cfg: &SimConfig, h: ThingHandle, spconf: &SpellConfig, level: u8) {
    let amount = pulse_amount(world, cfg, h, spconf, level);
    if amount > 0 {
        world.damage_thing(h, amount);
    } else if amount < 0 {
        world.heal_creature(cfg, h, -amount);
    }
}

// =============================================================================
// APPLY
// =============================================================================

/// Apply a spell to a creature.
pub fn apply_spell(
    world: &mut World,
    cfg: &SimConfig,
    h: ThingHandle,
    spell: SpellKind,
    level: u8,
    caster: PlayerId,
) -> SpellOutcome {
    let Some(spconf) = cfg.spell(spell) else {
        warn!("apply of unconfigured spell {:?}", spell);
        return SpellOutcome::Unknown;
    };
    let Some(ctrl) = world.control(h) else {
        error!("spell {:?} applied to {:?} without control data", spell, h);
        return SpellOutcome::NoControl;
    };
    let level = level.min(SPELL_MAX_LEVEL);
    let duration = spell_duration(cfg, spell, level);
    let immunities = cfg.creature(ctrl.kind).map(|s| s.immunities).unwrap_or_default();
    let live = ctrl.spell_flags;
    let persistent = spconf.flags - SpellFlags::HEAL;
    let turn = world.turn;

    // 1. One-time cleanse
    let mut cleansed = false;
    let overlap = spconf.cleanse_flags & live;
    if !overlap.is_empty() {
        clean_spell_effect(world, cfg, h, overlap);
        cleansed = true;
    }
    let has_more = !spconf.flags.is_empty() || spconf.damage != 0 || spconf.summon.is_some();
    if !has_more {
        return if cleansed { SpellOutcome::Cleansed } else { SpellOutcome::Instant };
    }

    // 2. One-shot damage or heal
    if spconf.damage != 0 && spconf.damage_frequency == 0 {
        apply_pulse(world, cfg, h, spconf, level);
        if spconf.flags.is_empty() && spconf.summon.is_none() {
            world.push_event(GameEvent::spell_applied(turn, h, spell, level, caster, false));
            return SpellOutcome::Instant;
        }
    }

    let ctx = FlagContext {
        spell,
        level,
        caster,
        heal: spell_heal_amount(cfg, spell, level),
    };

    // 3. Heal-only spells never take a slot
    if persistent.is_empty() && spconf.flags.contains(SpellFlags::HEAL) && !spconf.has_periodic() {
        if immunities.contains(SpellFlags::HEAL) {
            return SpellOutcome::Immune;
        }
        set_spell_flags(world, cfg, h, SpellFlags::HEAL, &ctx);
        world.push_event(GameEvent::spell_applied(turn, h, spell, level, caster, false));
        if let Some(sample) = spconf.cast_sound {
            world.push_event(GameEvent::sound(turn, sample, Some(h)));
        }
        return SpellOutcome::Instant;
    }

    // 4. Immune to everything it would set
    if !persistent.is_empty() && immunities.contains(persistent) && !spconf.has_periodic() {
        debug!("{:?} immune to {:?}", h, spell);
        return SpellOutcome::Immune;
    }

    // 5. Reapply in place or take a slot
    let existing = world.control(h).and_then(|c| c.spell_slot(spell));
    let outcome = match existing {
        Some(idx) => {
            if let Some(ctrl) = world.control_mut(h) {
                let slot = &mut ctrl.casted_spells[idx];
                slot.duration = duration;
                slot.caster_level = level;
                slot.caster_owner = caster;
            }
            set_spell_flags(world, cfg, h, spconf.flags, &ctx);
            SpellOutcome::Reapplied
        }
        None => {
            let Some(idx) = get_free_spell_slot(world, cfg, h) else {
                return SpellOutcome::NoControl;
            };
            if let Some(ctrl) = world.control_mut(h) {
                ctrl.casted_spells[idx] = CastedSpellData {
                    spkind: Some(spell),
                    duration,
                    caster_level: level,
                    caster_owner: caster,
                };
            }
            set_spell_flags(world, cfg, h, spconf.flags, &ctx);
            if let Some(summon) = spconf.summon {
                summon_familiars(world, cfg, h, summon.kind, summon.count, caster, level);
            }
            SpellOutcome::Applied
        }
    };

    if let (Some(effect), Some(pos)) = (spconf.aura_effect, world.thing(h).map(|t| t.pos)) {
        let lifespan = cfg.rules.effect_lifespan;
        if let Err(e) = world.create_effect(effect, pos, lifespan) {
            debug!("aura for {:?} skipped: {}", h, e);
        }
    }
    world.push_event(GameEvent::spell_applied(
        turn,
        h,
        spell,
        level,
        caster,
        outcome == SpellOutcome::Reapplied,
    ));
    if let Some(sample) = spconf.cast_sound {
        world.push_event(GameEvent::sound(turn, sample, Some(h)));
    }
    outcome
}

/// Index of a free spell slot, evicting the slot with the smallest
/// remaining duration (first on ties) when all are taken.
pub fn get_free_spell_slot(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> Option<usize> {
    let ctrl = world.control(h)?;
    if let Some(idx) = ctrl.casted_spells.iter().position(|s| s.is_free()) {
        return Some(idx);
    }
    let (idx, victim) = ctrl
        .casted_spells
        .iter()
        .enumerate()
        .min_by_key(|(i, s)| (s.duration.unsigned_abs(), *i))
        .map(|(i, s)| (i, s.spkind))?;
    debug!("spell slots of {:?} full, evicting slot {}", h, idx);
    if let Some(kind) = victim {
        terminate_spell(world, cfg, h, kind);
    }
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.casted_spells[idx] = CastedSpellData::default();
    }
    Some(idx)
}

fn summon_familiars(
    world: &mut World,
    cfg: &SimConfig,
    host: ThingHandle,
    kind: CreatureKind,
    count: u8,
    owner: PlayerId,
    level: u8,
) {
    let Some(pos) = world.thing(host).map(|t| t.pos) else {
        return;
    };
    for _ in 0..count {
        let dx = world.rng.next_int_range(-FAMILIAR_SPREAD, FAMILIAR_SPREAD);
        let dy = world.rng.next_int_range(-FAMILIAR_SPREAD, FAMILIAR_SPREAD);
        let spot = pos + Coord3d::new(dx, dy, 0);
        match world.create_creature(cfg, kind, owner, spot, level) {
            Ok(familiar) => {
                if let Some(ctrl) = world.control_mut(host) {
                    ctrl.familiars.push(familiar);
                }
                let turn = world.turn;
                world.push_event(GameEvent::new(
                    turn,
                    EventPriority::Spell,
                    GameEventData::FamiliarSummoned { host, familiar },
                ));
            }
            Err(e) => warn!("familiar for {:?} not summoned: {}", host, e),
        }
    }
}

// =============================================================================
// TERMINATE
// =============================================================================

/// End a spell: undo its flags and free its slot.
pub fn terminate_spell(world: &mut World, cfg: &SimConfig, h: ThingHandle, spell: SpellKind) {
    let (flags, summons) = match cfg.spell(spell) {
        Some(s) => (s.flags - SpellFlags::HEAL, s.summon.is_some()),
        None => (SpellFlags::empty(), false),
    };
    clear_spell_flags(world, cfg, h, flags);

    let familiars = match world.control_mut(h) {
        Some(ctrl) => {
            if let Some(idx) = ctrl.spell_slot(spell) {
                ctrl.casted_spells[idx] = CastedSpellData::default();
            }
            if summons {
                std::mem::take(&mut ctrl.familiars)
            } else {
                Vec::new()
            }
        }
        None => return,
    };
    for familiar in familiars {
        world.kill_thing(cfg, familiar);
    }
    let turn = world.turn;
    world.push_event(GameEvent::spell_expired(turn, h, spell));
}

/// End every spell on a creature.
pub fn terminate_all_spells(world: &mut World, cfg: &SimConfig, h: ThingHandle) {
    let active: Vec<SpellKind> = match world.control(h) {
        Some(ctrl) => ctrl.casted_spells.iter().filter_map(|s| s.spkind).collect(),
        None => return,
    };
    for spell in active {
        terminate_spell(world, cfg, h, spell);
    }
}

/// Remove `mask` from a creature.
///
/// A spell whose flags equal `mask` exactly is terminated outright;
/// otherwise only the flags are cleared and other spells sharing some of
/// them stay in their slots.
pub fn clean_spell_effect(world: &mut World, cfg: &SimConfig, h: ThingHandle, mask: SpellFlags) {
    let exact = world.control(h).and_then(|ctrl| {
        ctrl.casted_spells
            .iter()
            .filter_map(|s| s.spkind)
            .find(|k| cfg.spell(*k).map(|s| s.flags - SpellFlags::HEAL) == Some(mask))
    });
    match exact {
        Some(spell) => terminate_spell(world, cfg, h, spell),
        None => clear_spell_flags(world, cfg, h, mask),
    }
}

// =============================================================================
// TICK
// =============================================================================

/// Advance every spell slot and status timer of a creature by one turn.
pub fn tick_spells(world: &mut World, cfg: &SimConfig, h: ThingHandle) {
    let Some(ctrl) = world.control(h) else {
        return;
    };
    let immunities = cfg.creature(ctrl.kind).map(|s| s.immunities).unwrap_or_default();

    for idx in 0..CREATURE_MAX_SPELLS_CASTED_AT {
        let Some(ctrl) = world.control(h) else {
            return;
        };
        let slot = ctrl.casted_spells[idx];
        let Some(spell) = slot.spkind else {
            continue;
        };
        let Some(spconf) = cfg.spell(spell) else {
            warn!("slot {} of {:?} holds unconfigured {:?}", idx, h, spell);
            if let Some(ctrl) = world.control_mut(h) {
                ctrl.casted_spells[idx] = CastedSpellData::default();
            }
            continue;
        };

        // 1. Flags taken away by someone else
        let persistent = (spconf.flags - SpellFlags::HEAL) & !immunities;
        if !spconf.continuous && !persistent.is_empty() && !ctrl.spell_flags.contains(persistent) {
            terminate_spell(world, cfg, h, spell);
            continue;
        }

        // 2. Aura
        if let Some(effect) = spconf.aura_effect {
            if spconf.aura_frequency > 0 && slot.duration % spconf.aura_frequency as i32 == 0 {
                if let Some(pos) = world.thing(h).map(|t| t.pos) {
                    let lifespan = cfg.rules.effect_lifespan;
                    if let Err(e) = world.create_effect(effect, pos, lifespan) {
                        debug!("aura for {:?} skipped: {}", h, e);
                    }
                }
            }
        }

        // 3. Pulse
        if spconf.has_periodic() && slot.duration % spconf.damage_frequency as i32 == 0 {
            apply_pulse(world, cfg, h, spconf, slot.caster_level);
        }

        // 4. Teleport
        let teleporting = world.control(h).map(|c| c.active_teleport_spell == Some(spell)).unwrap_or(false);
        if teleporting && teleport_step(world, cfg, h, spell) {
            continue;
        }

        // 5. Countdown
        let remaining = match world.control_mut(h) {
            Some(ctrl) => {
                ctrl.casted_spells[idx].duration -= 1;
                ctrl.casted_spells[idx].duration
            }
            None => return,
        };
        if remaining <= 0 {
            let armed = world.control(h).map(|c| c.timebomb_armed).unwrap_or(false);
            let bomb = spconf.flags.contains(SpellFlags::TIMEBOMB) && armed;
            terminate_spell(world, cfg, h, spell);
            if bomb {
                detonate_timebomb(world, cfg, h);
            }
        }
    }

    tick_timers(world, cfg, h);
    world.recalculate_max_speed(cfg, h);
}

fn tick_timers(world: &mut World, _cfg: &SimConfig, h: ThingHandle) {
    let turn = world.turn;
    let Some(ctrl) = world.control_mut(h) else {
        return;
    };
    if ctrl.slap_turns > 0 {
        ctrl.slap_turns -= 1;
    }
    ctrl.force_visible = ctrl.force_visible.saturating_sub(1);
    ctrl.stopped_for_hand_turns = ctrl.stopped_for_hand_turns.saturating_sub(1);
    if ctrl.cower_turns > 0 {
        ctrl.cower_turns -= 1;
        if ctrl.cower_turns == 0 && ctrl.state == CreatureState::Cowering {
            ctrl.state = CreatureState::Idle;
        }
    }

    let mut morphed = false;
    if ctrl.has_flag(SpellFlags::CHICKEN) && !ctrl.chicken_morphed {
        ctrl.chicken_countdown = ctrl.chicken_countdown.saturating_sub(1);
        if ctrl.chicken_countdown == 0 {
            ctrl.chicken_morphed = true;
            morphed = true;
        }
    }
    if morphed {
        world.push_event(GameEvent::new(turn, EventPriority::Spell, GameEventData::CreatureMorphed { thing: h }));
    }
}

// =============================================================================
// TELEPORT AND TIME BOMB
// =============================================================================

/// Where a teleport of this creature should go.
///
/// Tries the owner's preference, then the heart. Each candidate is moved
/// to the nearest spot the creature fits; `None` means stay put.
pub fn resolve_teleport_destination(world: &World, cfg: &SimConfig, h: ThingHandle) -> Option<Coord3d> {
    let thing = world.thing(h)?;
    let player = world.player(thing.owner)?;
    let lair = world.control(h).and_then(|c| c.lair_pos);

    let preferred = match player.teleport_destination {
        TeleportDestination::Heart => player.heart_pos,
        TeleportDestination::Battle => player.last_battle,
        TeleportDestination::Lair => lair,
        TeleportDestination::Room(kind) => player
            .rooms
            .get(&kind)
            .and_then(|r| r.first())
            .map(|stl| stl.center(0)),
        TeleportDestination::Fixed(stl) => Some(stl.center(0)),
    };

    let radius = cfg.rules.relocate_search_radius;
    [preferred, player.heart_pos]
        .into_iter()
        .flatten()
        .find_map(|candidate| find_nearest_free_position(&world.map, thing, candidate, radius))
}

/// One teleport step. Returns true once the spell has ended.
fn teleport_step(world: &mut World, cfg: &SimConfig, h: ThingHandle, spell: SpellKind) -> bool {
    let pending = world.control(h).and_then(|c| c.teleport_dest);
    match pending {
        None => {
            let dest = resolve_teleport_destination(world, cfg, h)
                .or_else(|| world.thing(h).map(|t| t.pos));
            if let Some(ctrl) = world.control_mut(h) {
                ctrl.teleport_dest = dest;
            }
            false
        }
        Some(dest) => {
            let moved = match world.thing_mut(h) {
                Some(thing) if thing.pos != dest => {
                    thing.pos = dest;
                    thing.velocity = Coord3d::ZERO;
                    true
                }
                _ => false,
            };
            if moved {
                let turn = world.turn;
                world.push_event(GameEvent::new(turn, EventPriority::Spell, GameEventData::Teleported { thing: h, to: dest }));
            }
            terminate_spell(world, cfg, h, spell);
            true
        }
    }
}

fn detonate_timebomb(world: &mut World, cfg: &SimConfig, h: ThingHandle) {
    let Some(pos) = world.thing(h).map(|t| t.pos) else {
        return;
    };
    let damage = cfg.rules.timebomb_damage;
    for victim in world.creatures_near(pos, cfg.rules.timebomb_radius) {
        if victim != h {
            world.damage_thing(victim, damage);
        }
    }
    let turn = world.turn;
    world.push_event(GameEvent::new(
        turn,
        EventPriority::Combat,
        GameEventData::Explosion { source: Some(h), pos, damage },
    ));
    if let Err(e) = world.create_effect(cfg.rules.explosion_effect, pos, cfg.rules.effect_lifespan) {
        debug!("explosion effect skipped: {}", e);
    }
    if let Some(thing) = world.thing_mut(h) {
        thing.health = 0;
        thing.doomed = true;
    }
}

// =============================================================================
// TESTS
// =============================================================================
