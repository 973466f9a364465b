//! Status Flag Effects
//!
//! One row per status flag with its first-apply, reapply and clear hooks.
//! [`set_spell_flags`] and [`clear_spell_flags`] walk the table once, so
//! adding a status effect is a table edit.
//!
//! ```text
//!   flag        first apply                  reapply              clear
//!   ARMOUR      two lights at ±120°          -                    remove lights
//!   DISEASE     three motes, record caster   record caster        remove motes
//!   FREEZE      stop flying, speed 0         -                    restore flight
//!   FEAR        flee, demote possession      restart flee         undo demotion
//!   CHICKEN     start countdown              countdown / 5        unmorph
//!   TELEPORT    start resolving              restart resolving    stop
//!   LIGHT       -                            -                    kept if innate
//!   HEAL        heal now, never stored
//! ```

use tracing::debug;

use crate::config::{SimConfig, SpellFlags, SpellKind};
use crate::core::coord::Coord3d;
use crate::game::player::PlayerId;
use crate::game::thing::{ControlMode, CreatureState, MoveFlags, ThingHandle};
use crate::game::world::World;

/// Effect id of the lights orbiting an armoured creature.
pub const ARMOUR_LIGHT_EFFECT: u16 = 1;

/// Effect id of the motes orbiting a diseased creature.
pub const DISEASE_MOTE_EFFECT: u16 = 2;

/// Unit circle at 0°, 120° and 240°, scaled by 1000.
const THIRDS: [(i32, i32); 3] = [(1000, 0), (-500, 866), (-500, -866)];

/// What a flag hook needs to know about the spell being applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagContext {
    /// Spell carrying the flags
    pub spell: SpellKind,
    /// Level after clamping
    pub level: u8,
    /// Player who cast it
    pub caster: PlayerId,
    /// Healing for `HEAL`
    pub heal: i32,
}

type ApplyHook = fn(&mut World, &SimConfig, ThingHandle, &FlagContext);

/// Returns false to keep the bit set.
type ClearHook = fn(&mut World, &SimConfig, ThingHandle) -> bool;

/// One status flag's behaviour.
pub struct EffectEntry {
    /// Flag this row handles
    pub flag: SpellFlags,
    /// Stored in the live mask (false only for `HEAL`)
    pub persistent: bool,
    /// Runs when the flag was not set before
    pub on_first_apply: Option<ApplyHook>,
    /// Runs when the flag was already set
    pub on_reapply: Option<ApplyHook>,
    /// Runs before the bit is cleared
    pub on_clear: Option<ClearHook>,
}

const fn entry(flag: SpellFlags) -> EffectEntry {
    EffectEntry {
        flag,
        persistent: true,
        on_first_apply: None,
        on_reapply: None,
        on_clear: None,
    }
}

/// The status effect table, in bit order.
pub static EFFECT_TABLE: [EffectEntry; 16] = [
    entry(SpellFlags::SLOW),
    entry(SpellFlags::SPEED),
    EffectEntry {
        on_first_apply: Some(armour_first_apply),
        on_clear: Some(armour_clear),
        ..entry(SpellFlags::ARMOUR)
    },
    entry(SpellFlags::REBOUND),
    EffectEntry {
        on_first_apply: Some(flying_apply),
        on_reapply: Some(flying_apply),
        on_clear: Some(flying_clear),
        ..entry(SpellFlags::FLYING)
    },
    entry(SpellFlags::INVISIBILITY),
    entry(SpellFlags::SIGHT),
    EffectEntry {
        on_clear: Some(light_clear),
        ..entry(SpellFlags::LIGHT)
    },
    EffectEntry {
        on_first_apply: Some(disease_first_apply),
        on_reapply: Some(disease_reapply),
        on_clear: Some(disease_clear),
        ..entry(SpellFlags::DISEASE)
    },
    EffectEntry {
        on_first_apply: Some(chicken_first_apply),
        on_reapply: Some(chicken_reapply),
        on_clear: Some(chicken_clear),
        ..entry(SpellFlags::CHICKEN)
    },
    EffectEntry {
        on_first_apply: Some(freeze_first_apply),
        on_clear: Some(freeze_clear),
        ..entry(SpellFlags::FREEZE)
    },
    entry(SpellFlags::MAD_KILLING),
    EffectEntry {
        on_first_apply: Some(fear_first_apply),
        on_reapply: Some(fear_reapply),
        on_clear: Some(fear_clear),
        ..entry(SpellFlags::FEAR)
    },
    EffectEntry {
        on_first_apply: Some(teleport_apply),
        on_reapply: Some(teleport_apply),
        on_clear: Some(teleport_clear),
        ..entry(SpellFlags::TELEPORT)
    },
    EffectEntry {
        on_first_apply: Some(timebomb_apply),
        on_reapply: Some(timebomb_apply),
        on_clear: Some(timebomb_clear),
        ..entry(SpellFlags::TIMEBOMB)
    },
    EffectEntry {
        persistent: false,
        on_first_apply: Some(heal_apply),
        on_reapply: Some(heal_apply),
        ..entry(SpellFlags::HEAL)
    },
];

// =============================================================================
// TABLE WALKERS
// =============================================================================

/// Set `flags` on a creature, skipping flags its kind is immune to.
///
/// Returns the flags that took effect. Speed is recalculated afterwards.
pub fn set_spell_flags(
    world: &mut World,
    cfg: &SimConfig,
    h: ThingHandle,
    flags: SpellFlags,
    ctx: &FlagContext,
) -> SpellFlags {
    let Some(ctrl) = world.control(h) else {
        return SpellFlags::empty();
    };
    let immunities = cfg
        .creature(ctrl.kind)
        .map(|s| s.immunities)
        .unwrap_or_default();

    let mut affected = SpellFlags::empty();
    for row in EFFECT_TABLE.iter() {
        if !flags.contains(row.flag) || immunities.contains(row.flag) {
            continue;
        }
        let Some(ctrl) = world.control_mut(h) else {
            break;
        };
        let was_active = ctrl.has_flag(row.flag);
        if row.persistent {
            ctrl.spell_flags |= row.flag;
        }
        let hook = if was_active { row.on_reapply } else { row.on_first_apply };
        if let Some(hook) = hook {
            hook(world, cfg, h, ctx);
        }
        affected |= row.flag;
    }

    world.recalculate_max_speed(cfg, h);
    affected
}

/// Clear `mask` from a creature, undoing each flag's setup.
pub fn clear_spell_flags(world: &mut World, cfg: &SimConfig, h: ThingHandle, mask: SpellFlags) {
    for row in EFFECT_TABLE.iter().filter(|r| r.persistent && mask.contains(r.flag)) {
        let active = world.control(h).map(|c| c.has_flag(row.flag)).unwrap_or(false);
        if !active {
            continue;
        }
        let release = match row.on_clear {
            Some(hook) => hook(world, cfg, h),
            None => true,
        };
        if release {
            if let Some(ctrl) = world.control_mut(h) {
                ctrl.spell_flags -= row.flag;
            }
        }
    }
    world.recalculate_max_speed(cfg, h);
}

// =============================================================================
// COMPANIONS
// =============================================================================

fn orbit(radius: i32, third: usize, height: i32) -> Coord3d {
    let (c, s) = THIRDS[third % THIRDS.len()];
    Coord3d::new(radius * c / 1000, radius * s / 1000, height)
}

fn spawn_companions(world: &mut World, h: ThingHandle, effect: u16, offsets: &[Coord3d]) -> Vec<ThingHandle> {
    offsets
        .iter()
        .filter_map(|off| match world.create_companion(h, effect, *off) {
            Ok(c) => Some(c),
            Err(e) => {
                debug!("companion for {:?} not created: {}", h, e);
                None
            }
        })
        .collect()
}

fn remove_things(world: &mut World, cfg: &SimConfig, list: Vec<ThingHandle>) {
    for c in list {
        world.kill_thing(cfg, c);
    }
}

fn height_of(world: &World, h: ThingHandle) -> i32 {
    world.thing(h).map(|t| t.clipbox_size_yz / 2).unwrap_or(0)
}

// =============================================================================
// HOOKS
// =============================================================================

fn armour_first_apply(world: &mut World, cfg: &SimConfig, h: ThingHandle, _ctx: &FlagContext) {
    let r = cfg.rules.armour_orbit_radius;
    let z = height_of(world, h);
    let lights = spawn_companions(world, h, ARMOUR_LIGHT_EFFECT, &[orbit(r, 1, z), orbit(r, 2, z)]);
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.armour_lights.extend(lights);
    }
}

fn armour_clear(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> bool {
    let lights = world
        .control_mut(h)
        .map(|c| std::mem::take(&mut c.armour_lights))
        .unwrap_or_default();
    remove_things(world, cfg, lights);
    true
}

fn flying_apply(world: &mut World, _cfg: &SimConfig, h: ThingHandle, _ctx: &FlagContext) {
    let frozen = world.control(h).map(|c| c.has_flag(SpellFlags::FREEZE)).unwrap_or(false);
    if !frozen {
        if let Some(thing) = world.thing_mut(h) {
            thing.move_flags |= MoveFlags::FLYING;
        }
    }
}

fn flying_clear(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> bool {
    let Some(ctrl) = world.control(h) else {
        return true;
    };
    let innate = cfg.creature(ctrl.kind).map(|s| s.flying).unwrap_or(false);
    let frozen = ctrl.has_flag(SpellFlags::FREEZE);
    if let Some(thing) = world.thing_mut(h) {
        if innate && !frozen {
            thing.move_flags |= MoveFlags::FLYING;
        } else {
            thing.move_flags -= MoveFlags::FLYING;
        }
    }
    true
}

fn light_clear(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> bool {
    world
        .control(h)
        .and_then(|c| cfg.creature(c.kind))
        .map(|s| !s.illuminated)
        .unwrap_or(true)
}

fn disease_first_apply(world: &mut World, cfg: &SimConfig, h: ThingHandle, ctx: &FlagContext) {
    let r = cfg.rules.disease_orbit_radius;
    let z = height_of(world, h);
    let offsets: Vec<Coord3d> = (0..3).map(|i| orbit(r, i, z)).collect();
    let motes = spawn_companions(world, h, DISEASE_MOTE_EFFECT, &offsets);
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.disease_motes.extend(motes);
        ctrl.disease_caster = Some(ctx.caster);
    }
}

fn disease_reapply(world: &mut World, _cfg: &SimConfig, h: ThingHandle, ctx: &FlagContext) {
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.disease_caster = Some(ctx.caster);
    }
}

fn disease_clear(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> bool {
    let motes = world
        .control_mut(h)
        .map(|c| {
            c.disease_caster = None;
            std::mem::take(&mut c.disease_motes)
        })
        .unwrap_or_default();
    remove_things(world, cfg, motes);
    true
}

fn chicken_first_apply(world: &mut World, cfg: &SimConfig, h: ThingHandle, _ctx: &FlagContext) {
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.chicken_countdown = cfg.rules.chicken_grow_turns;
        ctrl.chicken_morphed = false;
    }
}

fn chicken_reapply(world: &mut World, _cfg: &SimConfig, h: ThingHandle, _ctx: &FlagContext) {
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.chicken_countdown /= 5;
    }
}

fn chicken_clear(world: &mut World, _cfg: &SimConfig, h: ThingHandle) -> bool {
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.chicken_countdown = 0;
        ctrl.chicken_morphed = false;
    }
    true
}

fn freeze_first_apply(world: &mut World, _cfg: &SimConfig, h: ThingHandle, _ctx: &FlagContext) {
    if let Some((thing, ctrl)) = world.creature_mut(h) {
        thing.move_flags -= MoveFlags::FLYING;
        thing.velocity = Coord3d::new(0, 0, thing.velocity.z.min(0));
        ctrl.move_speed = 0;
        ctrl.move_target = None;
    }
}

fn freeze_clear(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> bool {
    if let Some((thing, ctrl)) = world.creature_mut(h) {
        let innate = cfg.creature(ctrl.kind).map(|s| s.flying).unwrap_or(false);
        if innate || ctrl.has_flag(SpellFlags::FLYING) {
            thing.move_flags |= MoveFlags::FLYING;
        }
    }
    true
}

fn fear_first_apply(world: &mut World, _cfg: &SimConfig, h: ThingHandle, _ctx: &FlagContext) {
    let turn = world.turn;
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.state = CreatureState::Fleeing;
        ctrl.flee_start_turn = turn;
        if ctrl.control_mode == ControlMode::Direct {
            ctrl.control_mode = ControlMode::Passenger;
            ctrl.fear_demoted = true;
        }
    }
}

fn fear_reapply(world: &mut World, _cfg: &SimConfig, h: ThingHandle, _ctx: &FlagContext) {
    let turn = world.turn;
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.flee_start_turn = turn;
        if ctrl.state != CreatureState::Fleeing {
            ctrl.state = CreatureState::Fleeing;
        }
    }
}

fn fear_clear(world: &mut World, _cfg: &SimConfig, h: ThingHandle) -> bool {
    if let Some(ctrl) = world.control_mut(h) {
        if ctrl.state == CreatureState::Fleeing {
            ctrl.state = CreatureState::Idle;
        }
        if ctrl.fear_demoted {
            ctrl.fear_demoted = false;
            if ctrl.control_mode == ControlMode::Passenger {
                ctrl.control_mode = ControlMode::Direct;
            }
        }
    }
    true
}

fn teleport_apply(world: &mut World, _cfg: &SimConfig, h: ThingHandle, ctx: &FlagContext) {
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.active_teleport_spell = Some(ctx.spell);
        ctrl.teleport_dest = None;
        ctrl.state = CreatureState::Teleporting;
    }
}

fn teleport_clear(world: &mut World, _cfg: &SimConfig, h: ThingHandle) -> bool {
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.active_teleport_spell = None;
        ctrl.teleport_dest = None;
        if ctrl.state == CreatureState::Teleporting {
            ctrl.state = CreatureState::Idle;
        }
    }
    true
}

fn timebomb_apply(world: &mut World, _cfg: &SimConfig, h: ThingHandle, _ctx: &FlagContext) {
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.timebomb_armed = true;
    }
}

fn timebomb_clear(world: &mut World, _cfg: &SimConfig, h: ThingHandle) -> bool {
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.timebomb_armed = false;
    }
    true
}

fn heal_apply(world: &mut World, cfg: &SimConfig, h: ThingHandle, ctx: &FlagContext) {
    world.heal_creature(cfg, h, ctx.heal);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreatureKind;
    use crate::core::coord::SubtileCoord;
    use crate::game::map::{MapGrid, SlabKind};
    use crate::game::thing::ThingClass;

    fn setup(kind: CreatureKind) -> (World, SimConfig, ThingHandle) {
        let cfg = SimConfig::default();
        let mut world = World::new(MapGrid::new(5, 5, SlabKind::Path), &cfg.rules, 11);
        world.add_player(PlayerId(0));
        let h = world
            .create_creature(&cfg, kind, PlayerId(0), SubtileCoord::new(7, 7).center(0), 0)
            .unwrap();
        (world, cfg, h)
    }

    fn ctx(spell: SpellKind) -> FlagContext {
        FlagContext { spell, level: 1, caster: PlayerId(1), heal: 0 }
    }

    fn effect_count(world: &World) -> usize {
        world.things.iter().filter(|(_, t)| t.class == ThingClass::Effect).count()
    }

    #[test]
    fn test_table_is_in_bit_order() {
        for (i, row) in EFFECT_TABLE.iter().enumerate() {
            assert_eq!(row.flag.bits(), 1 << i);
        }
        assert!(EFFECT_TABLE.iter().filter(|r| !r.persistent).all(|r| r.flag == SpellFlags::HEAL));
    }

    #[test]
    fn test_armour_lights_spawn_once() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        set_spell_flags(&mut world, &cfg, h, SpellFlags::ARMOUR, &ctx(SpellKind::Armour));
        set_spell_flags(&mut world, &cfg, h, SpellFlags::ARMOUR, &ctx(SpellKind::Armour));
        assert_eq!(world.control(h).unwrap().armour_lights.len(), 2);
        assert_eq!(effect_count(&world), 2);

        clear_spell_flags(&mut world, &cfg, h, SpellFlags::ARMOUR);
        assert!(world.control(h).unwrap().armour_lights.is_empty());
        assert_eq!(effect_count(&world), 0);
        assert!(!world.control(h).unwrap().has_flag(SpellFlags::ARMOUR));
    }

    #[test]
    fn test_armour_lights_opposite_sides() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        set_spell_flags(&mut world, &cfg, h, SpellFlags::ARMOUR, &ctx(SpellKind::Armour));
        let lights = world.control(h).unwrap().armour_lights.clone();
        let a = world.thing(lights[0]).unwrap().orbit_offset;
        let b = world.thing(lights[1]).unwrap().orbit_offset;
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, -b.y);
        assert!(a.x < 0);
    }

    #[test]
    fn test_immune_flags_skipped() {
        let (mut world, cfg, h) = setup(CreatureKind::Dragon);
        let affected = set_spell_flags(
            &mut world,
            &cfg,
            h,
            SpellFlags::FREEZE | SpellFlags::SLOW,
            &ctx(SpellKind::Freeze),
        );
        assert_eq!(affected, SpellFlags::SLOW);
        assert!(!world.control(h).unwrap().has_flag(SpellFlags::FREEZE));
    }

    #[test]
    fn test_freeze_grounds_and_restores_flyer() {
        let (mut world, cfg, h) = setup(CreatureKind::Fairy);
        world.control_mut(h).unwrap().move_speed = 30;
        set_spell_flags(&mut world, &cfg, h, SpellFlags::FREEZE, &ctx(SpellKind::Freeze));
        assert!(!world.thing(h).unwrap().is_flying());
        assert_eq!(world.control(h).unwrap().move_speed, 0);
        assert_eq!(world.control(h).unwrap().max_speed, 0);

        clear_spell_flags(&mut world, &cfg, h, SpellFlags::FREEZE);
        assert!(world.thing(h).unwrap().is_flying());
        assert_eq!(world.control(h).unwrap().max_speed, 40);
    }

    #[test]
    fn test_fly_spell_clear_keeps_innate_flight() {
        let (mut world, cfg, h) = setup(CreatureKind::Fairy);
        set_spell_flags(&mut world, &cfg, h, SpellFlags::FLYING, &ctx(SpellKind::Fly));
        clear_spell_flags(&mut world, &cfg, h, SpellFlags::FLYING);
        assert!(world.thing(h).unwrap().is_flying());

        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        set_spell_flags(&mut world, &cfg, h, SpellFlags::FLYING, &ctx(SpellKind::Fly));
        assert!(world.thing(h).unwrap().is_flying());
        clear_spell_flags(&mut world, &cfg, h, SpellFlags::FLYING);
        assert!(!world.thing(h).unwrap().is_flying());
    }

    #[test]
    fn test_innate_light_survives_clear() {
        let (mut world, cfg, h) = setup(CreatureKind::Dragon);
        set_spell_flags(&mut world, &cfg, h, SpellFlags::LIGHT, &ctx(SpellKind::Light));
        clear_spell_flags(&mut world, &cfg, h, SpellFlags::LIGHT);
        assert!(world.control(h).unwrap().has_flag(SpellFlags::LIGHT));

        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        set_spell_flags(&mut world, &cfg, h, SpellFlags::LIGHT, &ctx(SpellKind::Light));
        clear_spell_flags(&mut world, &cfg, h, SpellFlags::LIGHT);
        assert!(!world.control(h).unwrap().has_flag(SpellFlags::LIGHT));
    }

    #[test]
    fn test_fear_demotes_and_restores_possession() {
        let (mut world, cfg, h) = setup(CreatureKind::Warlock);
        world.control_mut(h).unwrap().control_mode = ControlMode::Direct;
        world.turn = 40;
        set_spell_flags(&mut world, &cfg, h, SpellFlags::FEAR, &ctx(SpellKind::Fear));
        {
            let ctrl = world.control(h).unwrap();
            assert_eq!(ctrl.control_mode, ControlMode::Passenger);
            assert_eq!(ctrl.state, CreatureState::Fleeing);
            assert_eq!(ctrl.flee_start_turn, 40);
        }

        world.control_mut(h).unwrap().state = CreatureState::Idle;
        world.turn = 55;
        set_spell_flags(&mut world, &cfg, h, SpellFlags::FEAR, &ctx(SpellKind::Fear));
        assert_eq!(world.control(h).unwrap().state, CreatureState::Fleeing);
        assert_eq!(world.control(h).unwrap().flee_start_turn, 55);

        clear_spell_flags(&mut world, &cfg, h, SpellFlags::FEAR);
        let ctrl = world.control(h).unwrap();
        assert_eq!(ctrl.control_mode, ControlMode::Direct);
        assert_eq!(ctrl.state, CreatureState::Idle);
    }

    #[test]
    fn test_chicken_reapply_shortens_countdown() {
        let (mut world, cfg, h) = setup(CreatureKind::Warlock);
        set_spell_flags(&mut world, &cfg, h, SpellFlags::CHICKEN, &ctx(SpellKind::Chicken));
        assert_eq!(world.control(h).unwrap().chicken_countdown, cfg.rules.chicken_grow_turns);
        set_spell_flags(&mut world, &cfg, h, SpellFlags::CHICKEN, &ctx(SpellKind::Chicken));
        assert_eq!(world.control(h).unwrap().chicken_countdown, cfg.rules.chicken_grow_turns / 5);
    }

    #[test]
    fn test_disease_motes_and_caster() {
        let (mut world, cfg, h) = setup(CreatureKind::Warlock);
        set_spell_flags(&mut world, &cfg, h, SpellFlags::DISEASE, &ctx(SpellKind::Disease));
        assert_eq!(world.control(h).unwrap().disease_motes.len(), 3);
        assert_eq!(world.control(h).unwrap().disease_caster, Some(PlayerId(1)));
        clear_spell_flags(&mut world, &cfg, h, SpellFlags::DISEASE);
        assert_eq!(effect_count(&world), 0);
        assert_eq!(world.control(h).unwrap().disease_caster, None);
    }

    #[test]
    fn test_heal_never_stored() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        world.thing_mut(h).unwrap().health = 100;
        let heal = FlagContext { heal: 60, ..ctx(SpellKind::Heal) };
        let affected = set_spell_flags(&mut world, &cfg, h, SpellFlags::HEAL, &heal);
        assert_eq!(affected, SpellFlags::HEAL);
        assert_eq!(world.thing(h).unwrap().health, 160);
        assert!(!world.control(h).unwrap().has_flag(SpellFlags::HEAL));
    }

    #[test]
    fn test_teleport_and_timebomb_state() {
        let (mut world, cfg, h) = setup(CreatureKind::Imp);
        set_spell_flags(
            &mut world,
            &cfg,
            h,
            SpellFlags::TELEPORT | SpellFlags::TIMEBOMB,
            &ctx(SpellKind::Teleport),
        );
        let ctrl = world.control(h).unwrap();
        assert_eq!(ctrl.active_teleport_spell, Some(SpellKind::Teleport));
        assert!(ctrl.timebomb_armed);
        assert!(ctrl.is_bound());

        clear_spell_flags(&mut world, &cfg, h, SpellFlags::TELEPORT | SpellFlags::TIMEBOMB);
        let ctrl = world.control(h).unwrap();
        assert_eq!(ctrl.active_teleport_spell, None);
        assert!(!ctrl.timebomb_armed);
        assert_eq!(ctrl.state, CreatureState::Idle);
    }
}
