//! Power Effect Producers
//!
//! What a paid-for power actually does. Producers run after the dispatcher
//! has validated the target, so they only re-check what they need to act.

use tracing::{debug, info};

use crate::config::{PowerEffect, PowerKind, SimConfig, SpellFlags, SpellKind, SPELL_MAX_LEVEL};
use crate::core::coord::{Coord3d, SubtileCoord};
use crate::game::cast::{CastError, CastTarget};
use crate::game::events::{EventPriority, GameEvent, GameEventData};
use crate::game::map::SlabKind;
use crate::game::player::PlayerId;
use crate::game::script::ScriptHost;
use crate::game::spell::{apply_spell, SpellOutcome};
use crate::game::thing::{ControlMode, CreatureState, ThingHandle};
use crate::game::world::World;

const SLAP_SOUND: u16 = 75;
/// New diggers land up to this far off the subtile center.
const DIGGER_SPAWN_JITTER: i32 = 80;

/// Run the effect of `power` for `player`.
pub fn use_power(
    world: &mut World,
    cfg: &SimConfig,
    scripts: &mut dyn ScriptHost,
    player: PlayerId,
    power: PowerKind,
    level: u8,
    target: CastTarget,
) -> Result<(), CastError> {
    let pc = cfg.power(power).ok_or(CastError::UnknownPower(power))?;
    let level = level.min(SPELL_MAX_LEVEL);
    let strength = pc.strength[level as usize];

    match pc.effect {
        PowerEffect::None => Err(CastError::NoEffectProducer(power)),
        PowerEffect::ApplySpell(spell) => {
            let h = creature_target(world, power, target)?;
            use_power_apply_spell(world, cfg, player, power, h, spell, level)
        }
        PowerEffect::Slap => {
            let h = creature_target(world, power, target)?;
            use_power_slap(world, cfg, h, strength);
            Ok(())
        }
        PowerEffect::Lightning => {
            let stl = subtile_target(power, target)?;
            use_power_lightning(world, cfg, player, stl, strength);
            Ok(())
        }
        PowerEffect::CreateDigger => {
            let stl = subtile_target(power, target)?;
            let pos = stl.center(world.map.floor_at(stl));
            let h = world.create_creature(cfg, cfg.rules.digger_kind, player, pos, 0)?;
            let dx = world.rng.next_int_range(-DIGGER_SPAWN_JITTER, DIGGER_SPAWN_JITTER);
            let dy = world.rng.next_int_range(-DIGGER_SPAWN_JITTER, DIGGER_SPAWN_JITTER);
            if let Some(digger) = world.thing_mut(h) {
                digger.pos = digger.pos + Coord3d::new(dx, dy, 0);
            }
            info!("player {} summoned digger {:?}", player.0, h);
            Ok(())
        }
        PowerEffect::Obey => {
            use_power_obey(world, cfg, player);
            Ok(())
        }
        PowerEffect::CallToArms => {
            let keeper = world.player_mut(player).ok_or(CastError::UnknownPlayer(player))?;
            keeper.call_to_arms = match keeper.call_to_arms {
                Some(_) => None,
                None => Some(target.stl.ok_or(CastError::InvalidTarget(power))?),
            };
            Ok(())
        }
        PowerEffect::Sight => {
            let stl = subtile_target(power, target)?;
            world.map.reveal(player, stl, strength);
            Ok(())
        }
        PowerEffect::CaveIn => {
            let stl = subtile_target(power, target)?;
            use_power_cave_in(world, stl, strength);
            Ok(())
        }
        PowerEffect::DestroyWalls => {
            let stl = subtile_target(power, target)?;
            if world.map.slab_at(stl) != Some(SlabKind::Wall) {
                return Err(CastError::InvalidTarget(power));
            }
            world.map.set_slab_at(stl, SlabKind::Path, None);
            let turn = world.turn;
            world.push_event(GameEvent::slab_changed(turn, stl, SlabKind::Path, None));
            Ok(())
        }
        PowerEffect::Possess => {
            let h = creature_target(world, power, target)?;
            use_power_possess(world, player, h)
        }
        PowerEffect::PickUp => {
            let h = target.thing.ok_or(CastError::InvalidTarget(power))?;
            let thing = world.thing_mut(h).ok_or(CastError::InvalidTarget(power))?;
            thing.picked_up = true;
            thing.velocity = Coord3d::ZERO;
            if let Some(keeper) = world.player_mut(player) {
                keeper.hand.push(h);
            }
            Ok(())
        }
        PowerEffect::Script(id) => {
            if scripts.power_effect(world, cfg, id, player, power, level, target) {
                Ok(())
            } else {
                Err(CastError::ScriptRefused { id })
            }
        }
    }
}

fn creature_target(world: &World, power: PowerKind, target: CastTarget) -> Result<ThingHandle, CastError> {
    match target.thing {
        Some(h) if world.is_active_creature(h) => Ok(h),
        _ => Err(CastError::InvalidTarget(power)),
    }
}

fn subtile_target(power: PowerKind, target: CastTarget) -> Result<SubtileCoord, CastError> {
    target.stl.ok_or(CastError::InvalidTarget(power))
}

// =============================================================================
// PRODUCERS
// =============================================================================

/// Spell-backed powers.
///
/// Casting on a creature that already carries every flag, or healing one
/// at full health, succeeds without effect. Immune targets get a refusal
/// sound and still count as cast.
fn use_power_apply_spell(
    world: &mut World,
    cfg: &SimConfig,
    player: PlayerId,
    power: PowerKind,
    h: ThingHandle,
    spell: SpellKind,
    level: u8,
) -> Result<(), CastError> {
    let (Some(spconf), Some(ctrl)) = (cfg.spell(spell), world.control(h)) else {
        return Err(CastError::InvalidTarget(power));
    };
    let persistent = spconf.flags - SpellFlags::HEAL;
    if !persistent.is_empty() && ctrl.spell_flags.contains(persistent) && !spconf.has_periodic() {
        debug!("{:?} already under {:?}", h, spell);
        return Ok(());
    }
    if persistent.is_empty() && spconf.flags.contains(SpellFlags::HEAL) {
        let full = world.thing(h).map(|t| t.health).unwrap_or(0) >= world.max_health(cfg, h);
        if full {
            debug!("{:?} already at full health", h);
            return Ok(());
        }
    }

    let turn = world.turn;
    match apply_spell(world, cfg, h, spell, level, player) {
        SpellOutcome::Immune => {
            world.push_event(GameEvent::sound(turn, cfg.rules.rejection_sound, Some(h)));
            Ok(())
        }
        outcome if outcome.landed() => Ok(()),
        _ => Err(CastError::InvalidTarget(power)),
    }
}

fn use_power_slap(world: &mut World, cfg: &SimConfig, h: ThingHandle, strength: i32) {
    let turn = world.turn;
    world.damage_thing(h, cfg.rules.slap_damage);
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.slap_turns = strength.max(0) as u32;
        ctrl.cower_turns = cfg.rules.slap_cower_turns;
        if ctrl.state == CreatureState::Idle {
            ctrl.state = CreatureState::Cowering;
        }
    }
    world.recalculate_max_speed(cfg, h);
    world.push_event(GameEvent::sound(turn, SLAP_SOUND, Some(h)));
}

fn use_power_lightning(world: &mut World, cfg: &SimConfig, player: PlayerId, stl: SubtileCoord, damage: i32) {
    let pos = stl.center(world.map.floor_at(stl));
    let radius = cfg.rules.lightning_radius;
    for h in world.creatures_near(pos, radius) {
        let dealt = world.damage_thing(h, damage);
        let owner = world.thing(h).map(|t| t.owner);
        if let (true, Some(owner)) = (dealt > 0, owner) {
            if let Some(victim) = world.player_mut(owner) {
                victim.last_battle = Some(pos);
            }
        }
    }
    let turn = world.turn;
    if let Err(e) = world.create_effect(cfg.rules.explosion_effect, pos, cfg.rules.effect_lifespan) {
        debug!("lightning effect skipped: {}", e);
    }
    world.push_event(GameEvent::new(
        turn,
        EventPriority::Combat,
        GameEventData::Explosion { source: None, pos, damage },
    ));
    debug!("player {} struck lightning at {:?}", player.0, stl);
}

fn use_power_obey(world: &mut World, cfg: &SimConfig, player: PlayerId) {
    let Some(keeper) = world.player_mut(player) else {
        return;
    };
    keeper.must_obey = !keeper.must_obey;
    let creatures: Vec<_> = world
        .creatures()
        .into_iter()
        .filter(|h| world.thing(*h).map(|t| t.owner == player).unwrap_or(false))
        .collect();
    for h in creatures {
        world.recalculate_max_speed(cfg, h);
    }
}

/// Fill ground slabs around the target with earth. Things caught inside
/// are pushed out by physics on the next turn.
fn use_power_cave_in(world: &mut World, stl: SubtileCoord, strength: i32) {
    let (sx, sy) = stl.slab();
    let r = (strength - 1).max(0);
    let turn = world.turn;
    for y in sy - r..=sy + r {
        for x in sx - r..=sx + r {
            let center = SubtileCoord::new(x * 3 + 1, y * 3 + 1);
            let fillable = matches!(world.map.slab_at(center), Some(SlabKind::Path | SlabKind::Claimed));
            if fillable {
                world.map.set_slab(x, y, SlabKind::Earth, None);
                world.push_event(GameEvent::slab_changed(turn, center, SlabKind::Earth, None));
            }
        }
    }
}

fn use_power_possess(world: &mut World, player: PlayerId, h: ThingHandle) -> Result<(), CastError> {
    let previous = world
        .player(player)
        .ok_or(CastError::UnknownPlayer(player))?
        .controlled_thing;
    if let Some(old) = previous.filter(|old| *old != h) {
        if let Some(ctrl) = world.control_mut(old) {
            ctrl.control_mode = ControlMode::Ai;
        }
    }
    if let Some(ctrl) = world.control_mut(h) {
        ctrl.control_mode = ControlMode::Direct;
        ctrl.fear_demoted = false;
    }
    if let Some(keeper) = world.player_mut(player) {
        keeper.controlled_thing = Some(h);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreatureKind;
    use crate::game::cast::{magic_use_power, CastModFlags};
    use crate::game::map::MapGrid;
    use crate::game::script::NoScripts;

    const ME: PlayerId = PlayerId(0);
    const FOE: PlayerId = PlayerId(1);

    fn setup() -> (World, SimConfig) {
        let cfg = SimConfig::default();
        let mut world = World::new(MapGrid::new(8, 8, SlabKind::Path), &cfg.rules, 5);
        for id in [ME, FOE] {
            let p = world.add_player(id);
            p.gold = 10_000;
            p.available_powers = PowerKind::ALL.iter().copied().collect();
        }
        world.map.reveal_all(ME);
        world.map.fill_slabs((0, 0), (3, 7), SlabKind::Claimed, Some(ME));
        world.turn = 1;
        (world, cfg)
    }

    fn cast(world: &mut World, cfg: &SimConfig, power: PowerKind, level: u8, target: CastTarget) -> Result<i64, CastError> {
        magic_use_power(world, cfg, &mut NoScripts, ME, power, level, target, CastModFlags::empty())
    }

    fn creature(world: &mut World, cfg: &SimConfig, kind: CreatureKind, owner: PlayerId, stl: SubtileCoord) -> ThingHandle {
        world.create_creature(cfg, kind, owner, stl.center(0), 0).unwrap()
    }

    #[test]
    fn test_speed_power() {
        let (mut world, cfg) = setup();
        let h = creature(&mut world, &cfg, CreatureKind::Dwarf, ME, SubtileCoord::new(4, 4));
        cast(&mut world, &cfg, PowerKind::SpeedCreature, 2, CastTarget::on_thing(h, SubtileCoord::new(4, 4))).unwrap();
        let ctrl = world.control(h).unwrap();
        assert!(ctrl.has_flag(SpellFlags::SPEED));
        assert_eq!(ctrl.max_speed, 64);
    }

    #[test]
    fn test_already_under_spell_is_noop_success() {
        let (mut world, cfg) = setup();
        let h = creature(&mut world, &cfg, CreatureKind::Dwarf, ME, SubtileCoord::new(4, 4));
        let t = CastTarget::on_thing(h, SubtileCoord::new(4, 4));
        cast(&mut world, &cfg, PowerKind::Protect, 0, t).unwrap();
        world.control_mut(h).unwrap().casted_spells[0].duration = 7;
        // Still charged, but the slot is untouched
        let gold = world.player(ME).unwrap().gold;
        cast(&mut world, &cfg, PowerKind::Protect, 0, t).unwrap();
        assert_eq!(world.control(h).unwrap().casted_spells[0].duration, 7);
        assert_eq!(world.player(ME).unwrap().gold, gold - 250);
    }

    #[test]
    fn test_heal_at_full_health_is_noop() {
        let (mut world, cfg) = setup();
        let h = creature(&mut world, &cfg, CreatureKind::Dwarf, ME, SubtileCoord::new(4, 4));
        world.take_events();
        cast(&mut world, &cfg, PowerKind::HealCreature, 0, CastTarget::on_thing(h, SubtileCoord::new(4, 4))).unwrap();
        assert!(world
            .take_events()
            .iter()
            .all(|e| !matches!(e.data, GameEventData::SpellApplied { .. })));

        world.thing_mut(h).unwrap().health = 100;
        cast(&mut world, &cfg, PowerKind::HealCreature, 0, CastTarget::on_thing(h, SubtileCoord::new(4, 4))).unwrap();
        assert_eq!(world.thing(h).unwrap().health, 150);
    }

    #[test]
    fn test_immune_target_gets_refusal_sound() {
        let (mut world, cfg) = setup();
        let h = creature(&mut world, &cfg, CreatureKind::BileDemon, FOE, SubtileCoord::new(4, 4));
        world.take_events();
        cast(&mut world, &cfg, PowerKind::Chicken, 0, CastTarget::on_thing(h, SubtileCoord::new(4, 4))).unwrap();
        assert!(!world.control(h).unwrap().has_flag(SpellFlags::CHICKEN));
        let events = world.take_events();
        assert!(events
            .iter()
            .any(|e| e.data == GameEventData::SoundPlayed { sample: 119, thing: Some(h) }));
    }

    #[test]
    fn test_disease_records_caster_and_timebomb_arms() {
        let (mut world, cfg) = setup();
        let foe = creature(&mut world, &cfg, CreatureKind::Dwarf, FOE, SubtileCoord::new(4, 4));
        cast(&mut world, &cfg, PowerKind::Disease, 0, CastTarget::on_thing(foe, SubtileCoord::new(4, 4))).unwrap();
        assert_eq!(world.control(foe).unwrap().disease_caster, Some(ME));

        let mine = creature(&mut world, &cfg, CreatureKind::Dwarf, ME, SubtileCoord::new(7, 4));
        cast(&mut world, &cfg, PowerKind::TimeBomb, 0, CastTarget::on_thing(mine, SubtileCoord::new(7, 4))).unwrap();
        assert!(world.control(mine).unwrap().timebomb_armed);
    }

    #[test]
    fn test_slap() {
        let (mut world, cfg) = setup();
        let h = creature(&mut world, &cfg, CreatureKind::Dwarf, ME, SubtileCoord::new(4, 4));
        cast(&mut world, &cfg, PowerKind::Slap, 0, CastTarget::on_thing(h, SubtileCoord::new(4, 4))).unwrap();
        let ctrl = world.control(h).unwrap();
        assert_eq!(ctrl.slap_turns, 40);
        assert_eq!(ctrl.cower_turns, 18);
        assert_eq!(ctrl.state, CreatureState::Cowering);
        assert_eq!(ctrl.max_speed, 64);
        assert_eq!(world.thing(h).unwrap().health, 247);
    }

    #[test]
    fn test_lightning_hits_area() {
        let (mut world, cfg) = setup();
        let near = creature(&mut world, &cfg, CreatureKind::Dwarf, FOE, SubtileCoord::new(4, 4));
        let far = creature(&mut world, &cfg, CreatureKind::Dwarf, FOE, SubtileCoord::new(10, 4));
        cast(&mut world, &cfg, PowerKind::Lightning, 0, CastTarget::at(SubtileCoord::new(4, 4))).unwrap();
        assert_eq!(world.thing(near).unwrap().health, 220);
        assert_eq!(world.thing(far).unwrap().health, 250);
        assert!(world.player(FOE).unwrap().last_battle.is_some());
    }

    #[test]
    fn test_create_digger() {
        let (mut world, cfg) = setup();
        cast(&mut world, &cfg, PowerKind::CreateDigger, 0, CastTarget::at(SubtileCoord::new(4, 4))).unwrap();
        assert_eq!(world.count_creatures(ME, |c| c.kind == CreatureKind::Imp), 1);
        assert_eq!(world.player(ME).unwrap().gold, 10_000 - 300);
    }

    #[test]
    fn test_digger_lands_near_subtile_center() {
        let (mut world, cfg) = setup();
        let stl = SubtileCoord::new(4, 4);
        let before = world.rng.state();
        cast(&mut world, &cfg, PowerKind::CreateDigger, 0, CastTarget::at(stl)).unwrap();
        assert_ne!(world.rng.state(), before);

        let digger = world.creatures()[0];
        let pos = world.thing(digger).unwrap().pos;
        let center = stl.center(0);
        assert!((pos.x - center.x).abs() <= DIGGER_SPAWN_JITTER);
        assert!((pos.y - center.y).abs() <= DIGGER_SPAWN_JITTER);
        assert_eq!(pos.subtile(), stl);
    }

    #[test]
    fn test_obey_toggles_and_speeds_up() {
        let (mut world, cfg) = setup();
        let h = creature(&mut world, &cfg, CreatureKind::Dwarf, ME, SubtileCoord::new(4, 4));
        cast(&mut world, &cfg, PowerKind::Obey, 0, CastTarget::none()).unwrap();
        assert!(world.player(ME).unwrap().must_obey);
        assert_eq!(world.control(h).unwrap().max_speed, 40);
        cast(&mut world, &cfg, PowerKind::Obey, 0, CastTarget::none()).unwrap();
        assert!(!world.player(ME).unwrap().must_obey);
        assert_eq!(world.control(h).unwrap().max_speed, 32);
    }

    #[test]
    fn test_call_to_arms_toggles() {
        let (mut world, cfg) = setup();
        let stl = SubtileCoord::new(5, 5);
        cast(&mut world, &cfg, PowerKind::CallToArms, 0, CastTarget::at(stl)).unwrap();
        assert_eq!(world.player(ME).unwrap().call_to_arms, Some(stl));
        cast(&mut world, &cfg, PowerKind::CallToArms, 0, CastTarget::at(stl)).unwrap();
        assert_eq!(world.player(ME).unwrap().call_to_arms, None);
    }

    #[test]
    fn test_sight_reveals() {
        let (mut world, cfg) = setup();
        let stl = SubtileCoord::new(12, 12);
        assert!(!world.map.is_revealed(stl, FOE));
        magic_use_power(&mut world, &cfg, &mut NoScripts, FOE, PowerKind::Sight, 0, CastTarget::at(stl), CastModFlags::empty())
            .unwrap();
        assert!(world.map.is_revealed(SubtileCoord::new(16, 12), FOE));
        assert!(!world.map.is_revealed(SubtileCoord::new(17, 12), FOE));
    }

    #[test]
    fn test_cave_in_fills_ground() {
        let (mut world, cfg) = setup();
        cast(&mut world, &cfg, PowerKind::CaveIn, 0, CastTarget::at(SubtileCoord::new(13, 13))).unwrap();
        assert_eq!(world.map.slab_at(SubtileCoord::new(12, 12)), Some(SlabKind::Earth));
        assert_eq!(world.map.slab_at(SubtileCoord::new(15, 13)), Some(SlabKind::Path));
    }

    #[test]
    fn test_destroy_walls() {
        let (mut world, cfg) = setup();
        world.map.set_slab(5, 5, SlabKind::Wall, Some(FOE));
        cast(&mut world, &cfg, PowerKind::DestroyWalls, 0, CastTarget::at(SubtileCoord::new(16, 16))).unwrap();
        assert_eq!(world.map.slab_at(SubtileCoord::new(16, 16)), Some(SlabKind::Path));
    }

    #[test]
    fn test_possess_switches_control() {
        let (mut world, cfg) = setup();
        let a = creature(&mut world, &cfg, CreatureKind::Dwarf, ME, SubtileCoord::new(4, 4));
        let b = creature(&mut world, &cfg, CreatureKind::Dwarf, ME, SubtileCoord::new(7, 4));
        cast(&mut world, &cfg, PowerKind::Possess, 0, CastTarget::on_thing(a, SubtileCoord::new(4, 4))).unwrap();
        assert!(world.control(a).unwrap().is_first_person());
        cast(&mut world, &cfg, PowerKind::Possess, 0, CastTarget::on_thing(b, SubtileCoord::new(7, 4))).unwrap();
        assert!(!world.control(a).unwrap().is_first_person());
        assert!(world.control(b).unwrap().is_first_person());
        assert_eq!(world.player(ME).unwrap().controlled_thing, Some(b));
    }

    #[test]
    fn test_pickup_into_hand() {
        let (mut world, cfg) = setup();
        let h = creature(&mut world, &cfg, CreatureKind::Dwarf, ME, SubtileCoord::new(4, 4));
        cast(&mut world, &cfg, PowerKind::PickupCreature, 0, CastTarget::on_thing(h, SubtileCoord::new(4, 4))).unwrap();
        assert!(world.thing(h).unwrap().picked_up);
        assert_eq!(world.player(ME).unwrap().hand, vec![h]);
    }
}
