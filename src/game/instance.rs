//! Instance State Machine
//!
//! Timed creature actions (attacks, casts, digging, eating):
//!
//! ```text
//!   Idle ──trigger──▶ windup ──inst_turn == action──▶ fire ──▶ tail ──total──▶ Idle
//!                       ▲                                                 │
//!                       └──────── repeat pending: one more turn ◀─────────┘
//! ```
//!
//! Turn counts are scaled by the creature's status when the instance is
//! triggered, and the cooldown is anchored to the turn the action fired.

use tracing::{debug, warn};

use crate::config::{InstanceAction, InstanceFlags, InstanceKind, ShotKind, SimConfig, SpellFlags, SpellKind};
use crate::core::coord::{Coord3d, SubtileCoord, STL_PER_SLB};
use crate::game::events::{EventPriority, GameEvent, GameEventData};
use crate::game::map::SlabKind;
use crate::game::script::ScriptHost;
use crate::game::spell::apply_spell;
use crate::game::thing::{InstanceTarget, ThingHandle};
use crate::game::world::World;

// =============================================================================
// TIMING
// =============================================================================

/// Scale a turn count by status. Speed halves and overrides everything
/// else; otherwise slow doubles, then a slap takes a quarter off or, if
/// not slapped, the owner's obey does. Never below one.
pub fn scale_instance_turns(turns: u32, flags: SpellFlags, slapped: bool, obeying: bool) -> u32 {
    let mut t = turns;
    if flags.contains(SpellFlags::SPEED) {
        t /= 2;
    } else {
        if flags.contains(SpellFlags::SLOW) {
            t *= 2;
        }
        if slapped {
            t = 3 * t / 4;
        } else if obeying {
            t -= t / 4;
        }
    }
    t.max(1)
}

/// Scaled `(total, action)` turns of an instance for this creature.
pub fn instance_times(world: &World, cfg: &SimConfig, h: ThingHandle, kind: InstanceKind) -> Option<(u32, u32)> {
    let info = cfg.instance(kind)?;
    let thing = world.thing(h)?;
    let ctrl = world.control(h)?;
    let obeying = world.player(thing.owner).map(|p| p.must_obey).unwrap_or(false);
    let slapped = ctrl.slap_turns > 0;
    let (total, action, _) = info.times(ctrl.is_first_person());
    Some((
        scale_instance_turns(total, ctrl.spell_flags, slapped, obeying),
        scale_instance_turns(action, ctrl.spell_flags, slapped, obeying),
    ))
}

/// Animation progress per turn so the animation ends on the last turn.
pub fn anim_step(frames: i32, speed: i32, looping: bool, total_turns: u32) -> i32 {
    if speed <= 0 || total_turns == 0 {
        return 0;
    }
    let lifespan = (frames << 8) / speed;
    (lifespan - looping as i32) / total_turns as i32
}

// =============================================================================
// TRIGGER / ADVANCE
// =============================================================================

/// Start an instance. Returns false if it was refused.
pub fn trigger_instance(
    world: &mut World,
    cfg: &SimConfig,
    h: ThingHandle,
    kind: InstanceKind,
    target: InstanceTarget,
) -> bool {
    let Some(info) = cfg.instance(kind) else {
        warn!("instance {:?} has no configuration", kind);
        return false;
    };
    let Some(ctrl) = world.control(h) else {
        warn!("instance {:?} triggered on {:?} without control data", kind, h);
        return false;
    };

    if ctrl.instance_id == Some(kind) && info.flags.contains(InstanceFlags::REPEAT_TRIGGER) {
        if let Some(ctrl) = world.control_mut(h) {
            ctrl.inst_repeat = true;
        }
        return true;
    }

    let Some((total, action)) = instance_times(world, cfg, h, kind) else {
        return false;
    };
    let step = info
        .graphics
        .and_then(|slot| cfg.creature(ctrl.kind).and_then(|s| s.anims.get(&slot)))
        .map(|a| anim_step(a.frames, a.speed, a.looping, total))
        .unwrap_or(0);

    let Some(ctrl) = world.control_mut(h) else {
        return false;
    };
    ctrl.instance_id = Some(kind);
    ctrl.inst_turn = 0;
    ctrl.inst_total_turns = total;
    ctrl.inst_action_turns = action;
    ctrl.inst_repeat = false;
    ctrl.target = target;
    ctrl.instance_anim_step_turns = step;
    ctrl.force_visible = ctrl.force_visible.max(info.force_visibility);
    true
}

/// Start an instance from a raw id; zero and negative ids are rejected.
pub fn trigger_instance_by_id(
    world: &mut World,
    cfg: &SimConfig,
    h: ThingHandle,
    id: i32,
    target: InstanceTarget,
) -> bool {
    match InstanceKind::from_index(id) {
        Some(kind) => trigger_instance(world, cfg, h, kind, target),
        None => {
            warn!("invalid instance id {} for {:?}", id, h);
            false
        }
    }
}

/// Advance the running instance by one turn. Returns true if the action
/// fired this turn.
pub fn advance_instance(world: &mut World, cfg: &SimConfig, scripts: &mut dyn ScriptHost, h: ThingHandle) -> bool {
    let Some(ctrl) = world.control(h) else {
        return false;
    };
    let Some(kind) = ctrl.instance_id else {
        return false;
    };
    let Some(info) = cfg.instance(kind) else {
        return false;
    };
    if ctrl.stopped_for_hand_turns > 0 && !info.flags.contains(InstanceFlags::IGNORES_HAND_HOLD) {
        return false;
    }

    let turn = world.turn;
    let Some(ctrl) = world.control_mut(h) else {
        return false;
    };
    ctrl.inst_turn += 1;
    let fire = ctrl.inst_turn == ctrl.inst_action_turns;
    let target = ctrl.target;
    if fire {
        ctrl.instance_use_turn.insert(kind, turn);
        world.push_event(GameEvent::new(
            turn,
            EventPriority::Combat,
            GameEventData::InstanceFired { thing: h, instance: kind },
        ));
        run_action(world, cfg, scripts, h, info.action, target);
    }

    if let Some(ctrl) = world.control_mut(h) {
        if ctrl.instance_id == Some(kind) && ctrl.inst_turn >= ctrl.inst_total_turns {
            if ctrl.inst_repeat {
                ctrl.inst_turn -= 1;
                ctrl.inst_repeat = false;
            } else {
                ctrl.instance_id = None;
                ctrl.inst_turn = 0;
                ctrl.target = InstanceTarget::default();
            }
        }
    }
    fire
}

/// True once an instance may be used again.
///
/// The cooldown starts when the action fired and includes the tail of the
/// instance after it. Possessed creatures use first-person timings.
pub fn instance_has_reset(world: &World, cfg: &SimConfig, h: ThingHandle, kind: InstanceKind) -> bool {
    let (Some(ctrl), Some(info)) = (world.control(h), cfg.instance(kind)) else {
        return false;
    };
    let Some(last) = ctrl.instance_use_turn.get(&kind) else {
        return true;
    };
    let (total, action, reset) = info.times(ctrl.is_first_person());
    world.turn.saturating_sub(*last) >= reset + total.saturating_sub(action)
}

// =============================================================================
// ACTIONS
// =============================================================================

fn run_action(
    world: &mut World,
    cfg: &SimConfig,
    scripts: &mut dyn ScriptHost,
    h: ThingHandle,
    action: InstanceAction,
    target: InstanceTarget,
) {
    match action {
        InstanceAction::None => {}
        InstanceAction::FireShot(shot) => fire_shot(world, cfg, h, shot, target),
        InstanceAction::CastSpell(spell) => cast_spell(world, cfg, h, spell, target),
        InstanceAction::Dig => dig(world, h, target),
        InstanceAction::Reinforce => reinforce(world, h, target),
        InstanceAction::PrettyPath => pretty_path(world, h, target),
        InstanceAction::Eat => eat(world, cfg, h),
        InstanceAction::Fart => {
            if let Some(pos) = world.thing(h).map(|t| t.pos) {
                if let Err(e) = world.create_effect(cfg.rules.fart_effect, pos, cfg.rules.effect_lifespan) {
                    debug!("fart effect skipped: {}", e);
                }
            }
        }
        InstanceAction::Script(id) => {
            if !scripts.instance_action(world, cfg, id, h, target) {
                debug!("script {} declined instance action of {:?}", id, h);
            }
        }
    }
}

/// Position the target refers to, if it still exists.
fn target_pos(world: &World, target: InstanceTarget) -> Option<Coord3d> {
    match target.thing {
        Some(t) => world.thing(t).filter(|t| t.is_active()).map(|t| t.pos + Coord3d::new(0, 0, t.solid_size_yz / 2)),
        None => target.pos,
    }
}

fn target_subtile(world: &World, target: InstanceTarget) -> Option<SubtileCoord> {
    match target.thing {
        Some(t) => world.thing(t).map(|t| t.pos.subtile()),
        None => target.pos.map(|p| p.subtile()),
    }
}

fn fire_shot(world: &mut World, cfg: &SimConfig, h: ThingHandle, shot: ShotKind, target: InstanceTarget) {
    let Some(aim) = target_pos(world, target) else {
        debug!("{:?} lost its target before firing", h);
        return;
    };
    let (Some(thing), Some(ctrl), Some(shot_cfg)) = (world.thing(h), world.control(h), cfg.shot(shot)) else {
        return;
    };
    let origin = thing.pos + Coord3d::new(0, 0, thing.clipbox_size_yz / 2);
    let owner = thing.owner;
    let level = ctrl.exp_level;
    let dir = aim - origin;
    let span = dir.max_xy_abs().max(dir.z.abs());
    if span == 0 {
        return;
    }
    let velocity = dir.scale(shot_cfg.speed, span);
    match world.create_shot(cfg, shot, owner, Some(h), origin, velocity, level) {
        Ok(s) => {
            let turn = world.turn;
            world.push_event(GameEvent::new(
                turn,
                EventPriority::Combat,
                GameEventData::ShotFired { shot: s, kind: shot, owner },
            ));
        }
        Err(e) => warn!("{:?} could not fire {:?}: {}", h, shot, e),
    }
}

fn cast_spell(world: &mut World, cfg: &SimConfig, h: ThingHandle, spell: SpellKind, target: InstanceTarget) {
    let Some(spconf) = cfg.spell(spell) else {
        return;
    };
    if let Some(shot) = spconf.shot {
        fire_shot(world, cfg, h, shot, target);
        return;
    }
    let (Some(thing), Some(ctrl)) = (world.thing(h), world.control(h)) else {
        return;
    };
    let owner = thing.owner;
    let level = ctrl.exp_level;
    let ranged = ctrl
        .instance_id
        .and_then(|k| cfg.instance(k))
        .map(|i| i.flags.contains(InstanceFlags::RANGED_BUFF))
        .unwrap_or(false);
    let victim = match target.thing {
        Some(t) if ranged && world.is_active_creature(t) => t,
        _ => h,
    };
    apply_spell(world, cfg, victim, spell, level, owner);
}

fn dig(world: &mut World, h: ThingHandle, target: InstanceTarget) {
    let Some(stl) = target_subtile(world, target) else {
        return;
    };
    if !world.map.slab_at(stl).map(|s| s.is_diggable()).unwrap_or(false) {
        debug!("{:?} has nothing to dig at {:?}", h, stl);
        return;
    }
    world.map.set_slab_at(stl, SlabKind::Path, None);
    let turn = world.turn;
    world.push_event(GameEvent::slab_changed(turn, stl, SlabKind::Path, None));
}

fn reinforce(world: &mut World, h: ThingHandle, target: InstanceTarget) {
    let (Some(stl), Some(owner)) = (target_subtile(world, target), world.thing(h).map(|t| t.owner)) else {
        return;
    };
    if world.map.slab_at(stl) != Some(SlabKind::Earth) {
        return;
    }
    let d = STL_PER_SLB;
    let backed = [(d, 0), (-d, 0), (0, d), (0, -d)]
        .iter()
        .any(|(dx, dy)| world.map.owner_at(SubtileCoord::new(stl.x + dx, stl.y + dy)) == Some(owner));
    if !backed {
        debug!("{:?} cannot reinforce {:?} without owned ground next to it", h, stl);
        return;
    }
    world.map.set_slab_at(stl, SlabKind::Wall, Some(owner));
    let turn = world.turn;
    world.push_event(GameEvent::slab_changed(turn, stl, SlabKind::Wall, Some(owner)));
}

fn pretty_path(world: &mut World, h: ThingHandle, target: InstanceTarget) {
    let (Some(stl), Some(owner)) = (target_subtile(world, target), world.thing(h).map(|t| t.owner)) else {
        return;
    };
    if world.map.slab_at(stl) != Some(SlabKind::Path) {
        return;
    }
    world.map.set_slab_at(stl, SlabKind::Claimed, Some(owner));
    let turn = world.turn;
    world.push_event(GameEvent::slab_changed(turn, stl, SlabKind::Claimed, Some(owner)));
}

fn eat(world: &mut World, cfg: &SimConfig, h: ThingHandle) {
    let amount = world
        .control(h)
        .and_then(|c| cfg.creature(c.kind))
        .map(|s| s.hunger_heal)
        .unwrap_or(0);
    world.heal_creature(cfg, h, amount);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreatureKind;
    use crate::game::map::MapGrid;
    use crate::game::player::PlayerId;
    use crate::game::script::NoScripts;
    use crate::game::thing::{ControlMode, ThingClass};

    fn setup(kind: CreatureKind) -> (World, SimConfig, ThingHandle) {
        let cfg = SimConfig::default();
        let mut world = World::new(MapGrid::new(6, 6, SlabKind::Path), &cfg.rules, 9);
        world.add_player(PlayerId(0));
        world.add_player(PlayerId(1));
        let h = world
            .create_creature(&cfg, kind, PlayerId(0), SubtileCoord::new(8, 8).center(0), 0)
            .unwrap();
        (world, cfg, h)
    }

    /// Trigger then advance until the action fires; returns the firing turn.
    fn firing_turn(world: &mut World, cfg: &SimConfig, h: ThingHandle, kind: InstanceKind) -> Option<u32> {
        let target = InstanceTarget::at(SubtileCoord::new(10, 8).center(0));
        assert!(trigger_instance(world, cfg, h, kind, target));
        for n in 1..=64 {
            if advance_instance(world, cfg, &mut NoScripts, h) {
                return Some(n);
            }
        }
        None
    }

    #[test]
    fn test_scaling_table() {
        let none = SpellFlags::empty();
        assert_eq!(scale_instance_turns(8, none, false, false), 8);
        assert_eq!(scale_instance_turns(8, SpellFlags::SLOW, false, false), 16);
        assert_eq!(scale_instance_turns(8, SpellFlags::SPEED, false, false), 4);
        assert_eq!(scale_instance_turns(8, SpellFlags::SPEED | SpellFlags::SLOW, false, false), 4);
        assert_eq!(scale_instance_turns(8, none, true, false), 6);
        assert_eq!(scale_instance_turns(8, none, true, true), 6);
        assert_eq!(scale_instance_turns(8, SpellFlags::SPEED, true, true), 4);
        assert_eq!(scale_instance_turns(8, SpellFlags::SLOW, false, true), 12);
        assert_eq!(scale_instance_turns(1, SpellFlags::SPEED, true, true), 1);
    }

    #[test]
    fn test_obey_rounds_toward_longer_instances() {
        let none = SpellFlags::empty();
        let cases = [(1, 1), (2, 2), (3, 3), (5, 4), (7, 6), (9, 7)];
        for (turns, expected) in cases {
            assert_eq!(scale_instance_turns(turns, none, false, true), expected, "turns = {}", turns);
        }
        // Slap uses a plain three quarters and rounds down.
        assert_eq!(scale_instance_turns(5, none, true, false), 3);
        assert_eq!(scale_instance_turns(7, none, true, false), 5);
    }

    #[test]
    fn test_fires_on_unscaled_action_turn() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        assert_eq!(firing_turn(&mut world, &cfg, h, InstanceKind::Swing), Some(4));
    }

    #[test]
    fn test_fires_on_slowed_action_turn() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        world.control_mut(h).unwrap().spell_flags |= SpellFlags::SLOW;
        assert_eq!(firing_turn(&mut world, &cfg, h, InstanceKind::Swing), Some(8));
        assert_eq!(world.control(h).unwrap().inst_total_turns, 16);
    }

    #[test]
    fn test_fires_on_hasted_action_turn() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        world.control_mut(h).unwrap().spell_flags |= SpellFlags::SPEED;
        assert_eq!(firing_turn(&mut world, &cfg, h, InstanceKind::Swing), Some(2));
    }

    #[test]
    fn test_fires_on_slapped_action_turn() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        world.control_mut(h).unwrap().slap_turns = 10;
        assert_eq!(firing_turn(&mut world, &cfg, h, InstanceKind::Swing), Some(3));
    }

    #[test]
    fn test_fires_on_obeying_action_turn() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        world.player_mut(PlayerId(0)).unwrap().must_obey = true;
        assert_eq!(firing_turn(&mut world, &cfg, h, InstanceKind::Swing), Some(3));
    }

    #[test]
    fn test_instance_returns_to_idle() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        let target = InstanceTarget::at(SubtileCoord::new(10, 8).center(0));
        trigger_instance(&mut world, &cfg, h, InstanceKind::Swing, target);
        for _ in 0..8 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        let ctrl = world.control(h).unwrap();
        assert_eq!(ctrl.instance_id, None);
        assert_eq!(ctrl.inst_turn, 0);
    }

    #[test]
    fn test_repeat_extends_by_one_turn() {
        let (mut world, cfg, h) = setup(CreatureKind::Imp);
        let target = InstanceTarget::at(SubtileCoord::new(10, 8).center(0));
        trigger_instance(&mut world, &cfg, h, InstanceKind::Dig, target);
        for _ in 0..3 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        // Held trigger: counters keep running
        assert!(trigger_instance(&mut world, &cfg, h, InstanceKind::Dig, target));
        assert_eq!(world.control(h).unwrap().inst_turn, 3);
        assert!(world.control(h).unwrap().inst_repeat);

        for _ in 0..5 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        // Turn 8 consumed the repeat and stepped back to 7
        let ctrl = world.control(h).unwrap();
        assert_eq!(ctrl.instance_id, Some(InstanceKind::Dig));
        assert_eq!(ctrl.inst_turn, 7);
        assert!(!ctrl.inst_repeat);

        advance_instance(&mut world, &cfg, &mut NoScripts, h);
        assert_eq!(world.control(h).unwrap().instance_id, None);
    }

    #[test]
    fn test_non_repeat_trigger_restarts() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        let target = InstanceTarget::at(SubtileCoord::new(10, 8).center(0));
        trigger_instance(&mut world, &cfg, h, InstanceKind::Swing, target);
        advance_instance(&mut world, &cfg, &mut NoScripts, h);
        advance_instance(&mut world, &cfg, &mut NoScripts, h);
        trigger_instance(&mut world, &cfg, h, InstanceKind::Swing, target);
        assert_eq!(world.control(h).unwrap().inst_turn, 0);
    }

    #[test]
    fn test_invalid_id_rejected() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        assert!(!trigger_instance_by_id(&mut world, &cfg, h, -1, InstanceTarget::default()));
        assert!(!trigger_instance_by_id(&mut world, &cfg, h, 0, InstanceTarget::default()));
        assert_eq!(world.control(h).unwrap().instance_id, None);
        assert!(trigger_instance_by_id(&mut world, &cfg, h, 12, InstanceTarget::default()));
        assert_eq!(world.control(h).unwrap().instance_id, Some(InstanceKind::Fart));
    }

    #[test]
    fn test_hand_hold_pauses_except_eating() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        world.control_mut(h).unwrap().stopped_for_hand_turns = 5;
        let target = InstanceTarget::at(SubtileCoord::new(10, 8).center(0));
        trigger_instance(&mut world, &cfg, h, InstanceKind::Swing, target);
        advance_instance(&mut world, &cfg, &mut NoScripts, h);
        assert_eq!(world.control(h).unwrap().inst_turn, 0);

        trigger_instance(&mut world, &cfg, h, InstanceKind::Eat, InstanceTarget::default());
        advance_instance(&mut world, &cfg, &mut NoScripts, h);
        assert_eq!(world.control(h).unwrap().inst_turn, 1);
    }

    #[test]
    fn test_reset_anchored_to_action_turn() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        assert!(instance_has_reset(&world, &cfg, h, InstanceKind::Swing));
        world.turn = 100;
        assert_eq!(firing_turn(&mut world, &cfg, h, InstanceKind::Swing), Some(4));
        assert_eq!(world.control(h).unwrap().instance_use_turn.get(&InstanceKind::Swing), Some(&100));

        // reset 8 plus tail 8 - 4
        world.turn = 111;
        assert!(!instance_has_reset(&world, &cfg, h, InstanceKind::Swing));
        world.turn = 112;
        assert!(instance_has_reset(&world, &cfg, h, InstanceKind::Swing));

        // Possessed: reset 4 plus tail 4 - 2
        world.control_mut(h).unwrap().control_mode = ControlMode::Direct;
        world.turn = 106;
        assert!(instance_has_reset(&world, &cfg, h, InstanceKind::Swing));
    }

    #[test]
    fn test_anim_step() {
        // 8 frames at speed 256: lifespan 8 << 8 / 256 = 8
        assert_eq!(anim_step(8, 256, false, 4), 2);
        assert_eq!(anim_step(6, 192, true, 8), (8 - 1) / 8);
        assert_eq!(anim_step(6, 0, true, 8), 0);

        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        trigger_instance(&mut world, &cfg, h, InstanceKind::Eat, InstanceTarget::default());
        // 12 frames at 128 over 16 turns, looping
        assert_eq!(world.control(h).unwrap().instance_anim_step_turns, (24 - 1) / 16);
    }

    #[test]
    fn test_force_visibility_keeps_larger() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        world.control_mut(h).unwrap().force_visible = 20;
        let target = InstanceTarget::at(SubtileCoord::new(10, 8).center(0));
        trigger_instance(&mut world, &cfg, h, InstanceKind::Swing, target);
        assert_eq!(world.control(h).unwrap().force_visible, 20);
        world.control_mut(h).unwrap().force_visible = 2;
        trigger_instance(&mut world, &cfg, h, InstanceKind::Swing, target);
        assert_eq!(world.control(h).unwrap().force_visible, 8);
    }

    #[test]
    fn test_swing_launches_shot_at_target() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        let enemy = world
            .create_creature(&cfg, CreatureKind::Imp, PlayerId(1), SubtileCoord::new(9, 8).center(0), 0)
            .unwrap();
        trigger_instance(&mut world, &cfg, h, InstanceKind::Swing, InstanceTarget::thing(enemy));
        for _ in 0..4 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        let shots: Vec<_> = world.things.iter().filter(|(_, t)| t.class == ThingClass::Shot).collect();
        assert_eq!(shots.len(), 1);
        let (_, shot) = shots[0];
        assert_eq!(shot.parent, Some(h));
        assert_eq!(shot.velocity.x, 192);
        assert_eq!(shot.velocity.y, 0);
    }

    #[test]
    fn test_vanished_target_is_noop() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        let enemy = world
            .create_creature(&cfg, CreatureKind::Imp, PlayerId(1), SubtileCoord::new(9, 8).center(0), 0)
            .unwrap();
        trigger_instance(&mut world, &cfg, h, InstanceKind::Swing, InstanceTarget::thing(enemy));
        world.kill_thing(&cfg, enemy);
        for _ in 0..4 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        assert!(world.things.iter().all(|(_, t)| t.class != ThingClass::Shot));
    }

    #[test]
    fn test_self_buff() {
        let (mut world, cfg, h) = setup(CreatureKind::Warlock);
        trigger_instance(&mut world, &cfg, h, InstanceKind::Armour, InstanceTarget::default());
        for _ in 0..6 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        assert!(world.control(h).unwrap().has_flag(SpellFlags::ARMOUR));
    }

    #[test]
    fn test_ranged_buff_on_ally() {
        let (mut world, cfg, h) = setup(CreatureKind::Warlock);
        let ally = world
            .create_creature(&cfg, CreatureKind::Dwarf, PlayerId(0), SubtileCoord::new(10, 8).center(0), 0)
            .unwrap();
        trigger_instance(&mut world, &cfg, h, InstanceKind::Speed, InstanceTarget::thing(ally));
        for _ in 0..6 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        assert!(world.control(ally).unwrap().has_flag(SpellFlags::SPEED));
        assert!(!world.control(h).unwrap().has_flag(SpellFlags::SPEED));
    }

    #[test]
    fn test_terrain_actions() {
        let (mut world, cfg, h) = setup(CreatureKind::Imp);
        world.map.set_slab(4, 2, SlabKind::Earth, None);
        world.map.set_slab(2, 2, SlabKind::Claimed, Some(PlayerId(0)));
        let earth = InstanceTarget::at(SubtileCoord::new(13, 7).center(0));

        trigger_instance(&mut world, &cfg, h, InstanceKind::Reinforce, earth);
        for _ in 0..4 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        // Owned ground at slab (3, 2) is missing, so nothing happens
        assert_eq!(world.map.slab_at(SubtileCoord::new(13, 7)), Some(SlabKind::Earth));

        world.map.set_slab(3, 2, SlabKind::Claimed, Some(PlayerId(0)));
        world.control_mut(h).unwrap().instance_id = None;
        trigger_instance(&mut world, &cfg, h, InstanceKind::Reinforce, earth);
        for _ in 0..4 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        assert_eq!(world.map.slab_at(SubtileCoord::new(13, 7)), Some(SlabKind::Wall));
        assert_eq!(world.map.owner_at(SubtileCoord::new(13, 7)), Some(PlayerId(0)));

        world.map.set_slab(4, 3, SlabKind::Gold, None);
        let gold = InstanceTarget::at(SubtileCoord::new(13, 10).center(0));
        world.control_mut(h).unwrap().instance_id = None;
        trigger_instance(&mut world, &cfg, h, InstanceKind::Dig, gold);
        for _ in 0..4 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        assert_eq!(world.map.slab_at(SubtileCoord::new(13, 10)), Some(SlabKind::Path));

        world.control_mut(h).unwrap().instance_id = None;
        trigger_instance(&mut world, &cfg, h, InstanceKind::PrettyPath, gold);
        for _ in 0..4 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        assert_eq!(world.map.slab_at(SubtileCoord::new(13, 10)), Some(SlabKind::Claimed));
        assert_eq!(world.map.owner_at(SubtileCoord::new(13, 10)), Some(PlayerId(0)));
    }

    #[test]
    fn test_eat_heals() {
        let (mut world, cfg, h) = setup(CreatureKind::Dwarf);
        world.thing_mut(h).unwrap().health = 100;
        trigger_instance(&mut world, &cfg, h, InstanceKind::Eat, InstanceTarget::default());
        for _ in 0..8 {
            advance_instance(&mut world, &cfg, &mut NoScripts, h);
        }
        assert_eq!(world.thing(h).unwrap().health, 150);
    }

    struct Recorder(Vec<u16>);

    impl ScriptHost for Recorder {
        fn instance_action(
            &mut self,
            _world: &mut World,
            _cfg: &SimConfig,
            id: u16,
            _actor: ThingHandle,
            _target: InstanceTarget,
        ) -> bool {
            self.0.push(id);
            true
        }
    }

    #[test]
    fn test_script_action_routed_to_host() {
        let (mut world, cfg, h) = setup(CreatureKind::Imp);
        let mut host = Recorder(Vec::new());
        let target = InstanceTarget::at(SubtileCoord::new(10, 8).center(0));
        trigger_instance(&mut world, &cfg, h, InstanceKind::Tunnel, target);
        for _ in 0..4 {
            advance_instance(&mut world, &cfg, &mut host, h);
        }
        assert_eq!(host.0, vec![1]);
    }
}
