//! Movement Integrator
//!
//! Per-turn movement of every thing against the block grid:
//!
//! ```text
//!   velocity + accel ──▶ next position ──▶ blocked axes? ──no──▶ move
//!                                            │yes
//!                          creature/object ◀─┴─▶ shot
//!                          slide along wall       bounce or die
//!                                 │
//!                    still embedded? ──▶ nearest free subtile or stranded
//! ```
//!
//! All queries take the candidate position explicitly and never move the
//! thing while probing, so no caller can observe a half-applied move.

use tracing::debug;
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::config::SimConfig;
use crate::core::coord::{stl_num, stl_pos, Coord3d, MapCoord, SubtileCoord, COORD_PER_STL, STL_MASK};
use crate::game::events::{GameEvent, GameEventData, EventPriority};
use crate::game::map::{MapFlags, MapGrid, DEFAULT_CEILING};
use crate::game::thing::{BlockFlags, MoveFlags, Thing, ThingClass, ThingHandle};
use crate::game::world::World;

/// Velocity cap on every axis.
pub const MAX_VELOCITY: i32 = 256;

/// Height above the floor flying creatures cruise at.
pub const NORMAL_FLYING_ALTITUDE: MapCoord = 256;

/// Highest floor step a walker can climb.
const STEP_HEIGHT: MapCoord = COORD_PER_STL;

/// Upper bound on interpoints sampled along a shot's path.
const MAX_SHOT_INTERPOINTS: i32 = 64;

/// What happened to a thing this turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Did not move
    Stationary,
    /// Moved freely
    Moved,
    /// Slid along a wall
    Slid,
    /// Bounced off a wall
    Bounced,
    /// Was embedded and got moved to a free spot
    Relocated(Coord3d),
    /// Was embedded with nowhere to go
    Stranded,
    /// Shot struck a wall and died
    HitWall,
    /// Shot struck a creature
    HitThing(ThingHandle),
}

/// Result of probing a move axis by axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockedProbe {
    /// Blocked axes
    pub flags: BlockFlags,
    /// Door found by a blocked horizontal probe of a flying creature
    pub door: Option<SubtileCoord>,
}

// =============================================================================
// GEOMETRY QUERIES
// =============================================================================

fn covered_subtiles(size_xy: i32, pos: Coord3d) -> impl Iterator<Item = SubtileCoord> {
    let r = size_xy / 2;
    let (x0, x1) = (stl_num(pos.x - r), stl_num(pos.x + r));
    let (y0, y1) = (stl_num(pos.y - r), stl_num(pos.y + r));
    (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| SubtileCoord::new(x, y)))
}

/// True if the thing's clip box at `pos` overlaps solid geometry, sinks
/// into a floor or pokes through a ceiling.
pub fn thing_in_wall_at(map: &MapGrid, thing: &Thing, pos: Coord3d) -> bool {
    covered_subtiles(thing.clipbox_size_xy, pos).any(|stl| match map.block(stl) {
        None => true,
        Some(block) => {
            block.blocks_movement()
                || block.floor > pos.z
                || block.ceiling < pos.z + thing.clipbox_size_yz
        }
    })
}

/// Highest floor under the thing's clip box.
pub fn floor_height_under(map: &MapGrid, thing: &Thing, pos: Coord3d) -> MapCoord {
    covered_subtiles(thing.clipbox_size_xy, pos)
        .map(|stl| map.floor_at(stl))
        .max()
        .unwrap_or(DEFAULT_CEILING)
}

/// Lowest ceiling over the thing's clip box.
pub fn ceiling_height_above(map: &MapGrid, thing: &Thing, pos: Coord3d) -> MapCoord {
    covered_subtiles(thing.clipbox_size_xy, pos)
        .map(|stl| map.ceiling_at(stl))
        .min()
        .unwrap_or(DEFAULT_CEILING)
}

/// Height the thing would stand at on `pos`, or `None` if it does not fit.
pub fn get_thing_height_at(map: &MapGrid, thing: &Thing, pos: Coord3d) -> Option<MapCoord> {
    let mut floor = MapCoord::MIN;
    let mut ceiling = MapCoord::MAX;
    for stl in covered_subtiles(thing.clipbox_size_xy, pos) {
        let block = map.block(stl)?;
        if block.blocks_movement() {
            return None;
        }
        floor = floor.max(block.floor);
        ceiling = ceiling.min(block.ceiling);
    }
    if floor + thing.clipbox_size_yz > ceiling {
        None
    } else {
        Some(floor)
    }
}

/// True if stepping from `from` to `pos` would leave the thing stuck in
/// geometry it cannot simply climb onto.
pub fn position_over_floor_level(map: &MapGrid, thing: &Thing, from: Coord3d, pos: Coord3d) -> bool {
    if !thing_in_wall_at(map, thing, pos) {
        return false;
    }
    match get_thing_height_at(map, thing, pos) {
        None => true,
        Some(height) => height < from.z || height - from.z > STEP_HEIGHT,
    }
}

fn door_under(map: &MapGrid, thing: &Thing, pos: Coord3d) -> Option<SubtileCoord> {
    covered_subtiles(thing.clipbox_size_xy, pos).find(|stl| {
        map.block(*stl)
            .map(|b| b.flags.contains(MapFlags::DOOR))
            .unwrap_or(false)
    })
}

// =============================================================================
// BOUNDARY CROSSING
// =============================================================================

/// True if the segment leaves the start subtile through an X boundary
/// before a Y boundary.
pub fn cross_x_boundary_first(p1: Coord3d, p2: Coord3d) -> bool {
    let (dx, dy) = ((p2.x - p1.x) as i64, (p2.y - p1.y) as i64);
    let mul_x = if dx < 0 { stl_pos(p1.x) } else { 255 - stl_pos(p1.x) } as i64;
    let mul_y = if dy < 0 { stl_pos(p1.y) } else { 255 - stl_pos(p1.y) } as i64;
    (dx * mul_y).abs() > (mul_x * dy).abs()
}

/// True if the segment leaves the start subtile through a Y boundary
/// before an X boundary.
pub fn cross_y_boundary_first(p1: Coord3d, p2: Coord3d) -> bool {
    let (dx, dy) = ((p2.x - p1.x) as i64, (p2.y - p1.y) as i64);
    let mul_x = if dx < 0 { stl_pos(p1.x) } else { 255 - stl_pos(p1.x) } as i64;
    let mul_y = if dy < 0 { stl_pos(p1.y) } else { 255 - stl_pos(p1.y) } as i64;
    (dy * mul_x).abs() > (mul_y * dx).abs()
}

fn boundary(cur: MapCoord, delta: MapCoord) -> MapCoord {
    if delta < 0 {
        (cur & STL_MASK) - 1
    } else {
        (cur + COORD_PER_STL) & STL_MASK
    }
}

fn lerp(a0: MapCoord, a1: MapCoord, t_num: i64, t_den: i64) -> MapCoord {
    if t_den == 0 {
        return a0;
    }
    (a0 as i64 + (a1 - a0) as i64 * t_num / t_den) as MapCoord
}

fn point_at_x(from: Coord3d, to: Coord3d, x: MapCoord) -> Coord3d {
    let (num, den) = ((x - from.x) as i64, (to.x - from.x) as i64);
    Coord3d::new(x, lerp(from.y, to.y, num, den), lerp(from.z, to.z, num, den))
}

fn point_at_y(from: Coord3d, to: Coord3d, y: MapCoord) -> Coord3d {
    let (num, den) = ((y - from.y) as i64, (to.y - from.y) as i64);
    Coord3d::new(lerp(from.x, to.x, num, den), y, lerp(from.z, to.z, num, den))
}

/// True if a creature cannot walk the straight segment `from -> to`.
///
/// The segment is split at every subtile boundary it crosses, in the
/// order it crosses them, and each piece is validated. A diagonal that
/// grazes a solid corner subtile is rejected even when both endpoints are
/// free.
pub fn creature_cannot_move_directly_to(map: &MapGrid, thing: &Thing, from: Coord3d, to: Coord3d) -> bool {
    let limit = (from.stl_x() - to.stl_x()).abs() + (from.stl_y() - to.stl_y()).abs() + 2;
    let mut cur = from;
    for _ in 0..limit {
        let cross_x = cur.stl_x() != to.stl_x();
        let cross_y = cur.stl_y() != to.stl_y();
        let next = match (cross_x, cross_y) {
            (false, false) => return position_over_floor_level(map, thing, cur, to),
            (true, false) => point_at_x(from, to, boundary(cur.x, to.x - cur.x)),
            (false, true) => point_at_y(from, to, boundary(cur.y, to.y - cur.y)),
            (true, true) => {
                if cross_y_boundary_first(cur, to) {
                    point_at_y(from, to, boundary(cur.y, to.y - cur.y))
                } else {
                    point_at_x(from, to, boundary(cur.x, to.x - cur.x))
                }
            }
        };
        if position_over_floor_level(map, thing, cur, next) {
            return true;
        }
        cur = next;
    }
    position_over_floor_level(map, thing, cur, to)
}

// =============================================================================
// COLLISION RESPONSE
// =============================================================================

/// Probe each axis of the move separately.
///
/// Creatures probe with [`creature_cannot_move_directly_to`], everything
/// else with plain wall embedding. When no single axis is blocked but the
/// combined move is, all three axes count as blocked.
pub fn get_thing_blocked_flags_at(map: &MapGrid, thing: &Thing, from: Coord3d, pos: Coord3d) -> BlockedProbe {
    let creature = thing.is_creature();
    let cannot = |p: Coord3d| {
        if creature {
            creature_cannot_move_directly_to(map, thing, from, p)
        } else {
            thing_in_wall_at(map, thing, p)
        }
    };

    let probe_x = Coord3d::new(pos.x, from.y, from.z);
    let probe_y = Coord3d::new(from.x, pos.y, from.z);
    let probe_z = Coord3d::new(from.x, from.y, pos.z);

    let mut flags = BlockFlags::empty();
    if pos.x != from.x && cannot(probe_x) {
        flags |= BlockFlags::X;
    }
    if pos.y != from.y && cannot(probe_y) {
        flags |= BlockFlags::Y;
    }
    if pos.z != from.z && cannot(probe_z) {
        flags |= BlockFlags::Z;
    }

    let all = BlockFlags::X | BlockFlags::Y | BlockFlags::Z;
    let flags = if flags.is_empty() {
        if cannot(pos) { all } else { flags }
    } else if flags == BlockFlags::X {
        if cannot(Coord3d::new(from.x, pos.y, pos.z)) { all } else { flags }
    } else if flags == BlockFlags::Y {
        if cannot(Coord3d::new(pos.x, from.y, pos.z)) { all } else { flags }
    } else if flags == BlockFlags::Z {
        if cannot(Coord3d::new(pos.x, pos.y, from.z)) { all } else { flags }
    } else {
        flags
    };

    let mut door = None;
    if creature && thing.is_flying() {
        for (axis, probe) in [(BlockFlags::X, probe_x), (BlockFlags::Y, probe_y)] {
            if flags.contains(axis) {
                if let Some(stl) = door_under(map, thing, probe) {
                    door = Some(stl);
                    break;
                }
            }
        }
    }

    BlockedProbe { flags, door }
}

fn slide_axis(cur: MapCoord, new: MapCoord, half: MapCoord) -> MapCoord {
    if new > cur {
        ((new + half) & STL_MASK) - half - 1
    } else if new < cur {
        ((new - half) & STL_MASK) + half + COORD_PER_STL
    } else {
        new
    }
}

/// Pull blocked axes back so the clip box rests against the wall.
pub fn slide_thing_against_wall_at(map: &MapGrid, thing: &Thing, from: Coord3d, pos: Coord3d, flags: BlockFlags) -> Coord3d {
    let half = thing.clipbox_size_xy / 2;
    let mut out = pos;
    if flags.contains(BlockFlags::X) {
        out.x = slide_axis(from.x, pos.x, half);
    }
    if flags.contains(BlockFlags::Y) {
        out.y = slide_axis(from.y, pos.y, half);
    }
    if flags.contains(BlockFlags::Z) {
        let probe = Coord3d::new(out.x, out.y, from.z);
        if pos.z > from.z {
            out.z = (ceiling_height_above(map, thing, probe) - thing.clipbox_size_yz).max(from.z.min(pos.z));
        } else if pos.z < from.z {
            out.z = floor_height_under(map, thing, probe);
        }
    }
    out
}

/// Reflect a shot off the blocked axes. Returns the new position and velocity.
pub fn bounce_thing_off_wall_at(
    velocity: Coord3d,
    from: Coord3d,
    pos: Coord3d,
    flags: BlockFlags,
    bounce_angle: i32,
    bounce_damping: i32,
) -> (Coord3d, Coord3d) {
    let axis = |blocked: bool, f: MapCoord, p: MapCoord, v: i32| {
        if blocked {
            (f, -(v * bounce_angle / 128))
        } else {
            (p, v * (256 - bounce_damping) / 256)
        }
    };
    let (px, vx) = axis(flags.contains(BlockFlags::X), from.x, pos.x, velocity.x);
    let (py, vy) = axis(flags.contains(BlockFlags::Y), from.y, pos.y, velocity.y);
    let (pz, vz) = axis(flags.contains(BlockFlags::Z), from.z, pos.z, velocity.z);
    (Coord3d::new(px, py, pz), Coord3d::new(vx, vy, vz))
}

/// Shots other than boulders ignore the map's vertical limits.
pub fn thing_is_exempt_from_z_axis_clipping(cfg: &SimConfig, thing: &Thing) -> bool {
    match thing.shot_kind() {
        Some(kind) => !cfg.shot(kind).map(|s| s.boulder).unwrap_or(false),
        None => false,
    }
}

/// Position after applying velocity, clipped to the map.
pub fn get_thing_next_position(map: &MapGrid, thing: &Thing, exempt_z: bool) -> Coord3d {
    let mut next = thing.pos + thing.velocity;
    next.x = next.x.clamp(0, map.max_coord_x());
    next.y = next.y.clamp(0, map.max_coord_y());
    if !exempt_z {
        next.z = next.z.clamp(0, DEFAULT_CEILING);
    }
    next
}

/// Vertical velocity steering a flyer into its altitude band.
pub fn flight_altitude_change(map: &MapGrid, thing: &Thing, pos: Coord3d, max_speed: i32) -> MapCoord {
    let floor = floor_height_under(map, thing, pos);
    let ceiling = ceiling_height_above(map, thing, pos);
    let low = floor + NORMAL_FLYING_ALTITUDE * 16 / 17;
    let high = floor + NORMAL_FLYING_ALTITUDE * 19 / 17;
    let nudge = (max_speed / 8).max(1);

    let dz = if pos.z < low {
        nudge.min(low - pos.z)
    } else if pos.z > high {
        -nudge.min(pos.z - high)
    } else {
        0
    };

    let top = ceiling - thing.clipbox_size_yz;
    if pos.z + dz > top {
        top - pos.z
    } else {
        dz
    }
}

/// Nearest subtile center within `radius` subtiles where the thing fits.
pub fn find_nearest_free_position(map: &MapGrid, thing: &Thing, around: Coord3d, radius: i32) -> Option<Coord3d> {
    let center = around.subtile();
    for r in 0..=radius.max(0) {
        let mut best: Option<(i64, Coord3d)> = None;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs().max(dy.abs()) != r {
                    continue;
                }
                let stl = SubtileCoord::new(center.x + dx, center.y + dy);
                if !map.in_bounds(stl) {
                    continue;
                }
                let spot = stl.center(0);
                if let Some(z) = get_thing_height_at(map, thing, spot) {
                    let candidate = spot.with_z(z);
                    let dist = candidate.distance_xy_squared(around);
                    if best.map(|(d, _)| dist < d).unwrap_or(true) {
                        best = Some((dist, candidate));
                    }
                }
            }
        }
        if let Some((_, pos)) = best {
            return Some(pos);
        }
    }
    None
}

// =============================================================================
// PER-THING MOVEMENT
// =============================================================================

/// Move one thing for this turn and apply the consequences.
pub fn move_thing(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> MoveOutcome {
    let Some(thing) = world.thing(h) else {
        return MoveOutcome::Stationary;
    };
    if thing.picked_up || thing.doomed {
        return MoveOutcome::Stationary;
    }
    let class = thing.class;
    let outcome = match class {
        ThingClass::Creature => move_creature(world, cfg, h),
        ThingClass::Shot => move_shot(world, cfg, h),
        ThingClass::Object => move_object(world, cfg, h),
        ThingClass::Effect => move_effect(world, h),
    };

    #[cfg(feature = "debug-tracing")]
    trace!("move {:?}: {:?}", h, outcome);

    match outcome {
        MoveOutcome::HitThing(victim) => resolve_shot_hit(world, cfg, h, victim),
        MoveOutcome::HitWall | MoveOutcome::Stranded => {
            if let Some(thing) = world.thing_mut(h) {
                thing.doomed = true;
            }
            if outcome == MoveOutcome::Stranded {
                debug!("{:?} stranded in geometry", h);
                let turn = world.turn;
                world.push_event(GameEvent::new(turn, EventPriority::Death, GameEventData::Stranded { thing: h }));
            }
        }
        MoveOutcome::Relocated(to) => {
            let turn = world.turn;
            world.push_event(GameEvent::new(turn, EventPriority::Other, GameEventData::Relocated { thing: h, to }));
        }
        _ => {}
    }
    outcome
}

fn steer_towards(ctrl_target: Option<Coord3d>, pos: Coord3d, speed: i32, velocity: Coord3d) -> (Coord3d, bool) {
    let Some(target) = ctrl_target else {
        return (velocity, false);
    };
    let diff = Coord3d::new(target.x - pos.x, target.y - pos.y, 0);
    let dist = diff.max_xy_abs();
    if dist == 0 {
        return (Coord3d::new(0, 0, velocity.z), true);
    }
    let step = if dist <= speed { diff } else { diff.scale(speed, dist) };
    (Coord3d::new(step.x, step.y, velocity.z), false)
}

fn move_creature(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> MoveOutcome {
    let Some(mut thing) = world.thing(h).cloned() else {
        return MoveOutcome::Stationary;
    };
    let Some(ctrl) = world.control(h) else {
        return MoveOutcome::Stationary;
    };
    let max_speed = ctrl.max_speed;
    let door_before = ctrl.collided_door_subtile;
    let (mut vel, arrived) = steer_towards(ctrl.move_target, thing.pos, max_speed, thing.velocity + thing.accel);
    let map = &world.map;
    let from = thing.pos;
    let flying = thing.is_flying();

    let cap = max_speed.min(MAX_VELOCITY);
    vel.x = vel.x.clamp(-cap, cap);
    vel.y = vel.y.clamp(-cap, cap);
    if flying {
        vel.z = flight_altitude_change(map, &thing, from, max_speed);
    } else if from.z > floor_height_under(map, &thing, from) {
        vel.z = (vel.z - cfg.rules.creature_fall_acceleration).max(-MAX_VELOCITY);
    } else {
        vel.z = vel.z.clamp(0, MAX_VELOCITY);
    }
    thing.velocity = vel;
    thing.accel = Coord3d::ZERO;

    let mut outcome = MoveOutcome::Stationary;
    let mut touching = None;
    if vel != Coord3d::ZERO {
        let target = get_thing_next_position(map, &thing, false);
        let probe = get_thing_blocked_flags_at(map, &thing, from, target);
        thing.blocked = probe.flags;
        if probe.flags.is_empty() {
            thing.pos = target;
            outcome = MoveOutcome::Moved;
        } else {
            thing.pos = slide_thing_against_wall_at(map, &thing, from, target, probe.flags);
            zero_blocked_axes(&mut thing, probe.flags);
            outcome = MoveOutcome::Slid;
            touching = probe.door;
        }
    }

    settle_vertical(map, &mut thing, flying);
    let outcome = unembed(map, cfg, &mut thing, outcome);

    #[cfg(feature = "debug-tracing")]
    trace!("creature {:?} {:?} -> {:?}", h, from, thing.pos);

    if let Some(slot) = world.thing_mut(h) {
        *slot = thing;
    }
    // Held only while the creature keeps pushing against the door.
    if let Some(ctrl) = world.control_mut(h) {
        if arrived {
            ctrl.move_target = None;
        }
        ctrl.collided_door_subtile = touching;
    }
    if let Some(stl) = touching.filter(|stl| door_before != Some(*stl)) {
        let turn = world.turn;
        world.push_event(GameEvent::new(turn, EventPriority::Combat, GameEventData::DoorCollision { thing: h, stl }));
    }
    outcome
}

fn move_object(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> MoveOutcome {
    let Some(mut thing) = world.thing(h).cloned() else {
        return MoveOutcome::Stationary;
    };
    let map = &world.map;
    let from = thing.pos;
    let mut vel = thing.velocity + thing.accel;
    if from.z > floor_height_under(map, &thing, from) {
        vel.z = (vel.z - cfg.rules.creature_fall_acceleration).max(-MAX_VELOCITY);
    }
    thing.velocity = vel;
    thing.accel = Coord3d::ZERO;

    let mut outcome = MoveOutcome::Stationary;
    if vel != Coord3d::ZERO {
        let target = get_thing_next_position(map, &thing, false);
        let probe = get_thing_blocked_flags_at(map, &thing, from, target);
        thing.blocked = probe.flags;
        if probe.flags.is_empty() {
            thing.pos = target;
            outcome = MoveOutcome::Moved;
        } else {
            thing.pos = slide_thing_against_wall_at(map, &thing, from, target, probe.flags);
            zero_blocked_axes(&mut thing, probe.flags);
            outcome = MoveOutcome::Slid;
        }
    }
    settle_vertical(map, &mut thing, false);
    let outcome = unembed(map, cfg, &mut thing, outcome);
    if let Some(slot) = world.thing_mut(h) {
        *slot = thing;
    }
    outcome
}

fn move_effect(world: &mut World, h: ThingHandle) -> MoveOutcome {
    let Some(thing) = world.thing(h) else {
        return MoveOutcome::Stationary;
    };
    let Some(host) = thing.parent else {
        return MoveOutcome::Stationary;
    };
    let offset = thing.orbit_offset;
    let host_pos = world.thing(host).map(|t| t.pos);
    match (host_pos, world.thing_mut(h)) {
        (Some(p), Some(thing)) => {
            thing.pos = p + offset;
            MoveOutcome::Moved
        }
        (None, Some(thing)) => {
            thing.doomed = true;
            MoveOutcome::Stationary
        }
        _ => MoveOutcome::Stationary,
    }
}

fn move_shot(world: &mut World, cfg: &SimConfig, h: ThingHandle) -> MoveOutcome {
    let Some(mut thing) = world.thing(h).cloned() else {
        return MoveOutcome::Stationary;
    };
    let Some(shot) = thing.shot_kind().and_then(|k| cfg.shot(k)) else {
        return MoveOutcome::HitWall;
    };
    let from = thing.pos;
    let mut vel = thing.velocity + thing.accel;
    vel.z -= shot.fall_acceleration;
    vel = Coord3d::new(
        vel.x.clamp(-MAX_VELOCITY, MAX_VELOCITY),
        vel.y.clamp(-MAX_VELOCITY, MAX_VELOCITY),
        vel.z.clamp(-MAX_VELOCITY, MAX_VELOCITY),
    );
    thing.velocity = vel;
    thing.accel = Coord3d::ZERO;

    let exempt = thing_is_exempt_from_z_axis_clipping(cfg, &thing);
    let target = get_thing_next_position(&world.map, &thing, exempt);

    if let Some(victim) = find_shot_victim(world, h, &thing, from, target) {
        if let Some(slot) = world.thing_mut(h) {
            slot.velocity = vel;
        }
        return MoveOutcome::HitThing(victim);
    }

    let probe = get_thing_blocked_flags_at(&world.map, &thing, from, target);
    thing.blocked = probe.flags;
    let outcome = if probe.flags.is_empty() {
        thing.pos = target;
        MoveOutcome::Moved
    } else if shot.bounce_angle == 0 {
        MoveOutcome::HitWall
    } else {
        let (pos, vel) = bounce_thing_off_wall_at(vel, from, target, probe.flags, shot.bounce_angle, shot.bounce_damping);
        thing.pos = pos;
        thing.velocity = vel;
        MoveOutcome::Bounced
    };
    if let Some(slot) = world.thing_mut(h) {
        *slot = thing;
    }
    outcome
}

fn find_shot_victim(world: &World, h: ThingHandle, shot: &Thing, from: Coord3d, to: Coord3d) -> Option<ThingHandle> {
    let spacing = (shot.solid_size_xy / 2).max(16);
    let span = (to - from).max_xy_abs().max((to.z - from.z).abs());
    let steps = ((span + spacing - 1) / spacing).clamp(1, MAX_SHOT_INTERPOINTS);

    for i in 1..=steps {
        let p = from + (to - from).scale(i, steps);
        for (ch, c) in world.things.iter() {
            if ch == h || !c.is_creature() || !c.is_active() || c.picked_up {
                continue;
            }
            if c.owner == shot.owner || Some(ch) == shot.parent {
                continue;
            }
            let reach = (shot.solid_size_xy + c.solid_size_xy) / 2;
            let overlap_xy = (p.x - c.pos.x).abs() <= reach && (p.y - c.pos.y).abs() <= reach;
            let overlap_z = p.z <= c.pos.z + c.solid_size_yz && c.pos.z <= p.z + shot.solid_size_yz;
            if overlap_xy && overlap_z {
                return Some(ch);
            }
        }
    }
    None
}

fn resolve_shot_hit(world: &mut World, cfg: &SimConfig, shot_h: ThingHandle, victim: ThingHandle) {
    let Some(shot) = world.thing(shot_h) else {
        return;
    };
    let (owner, level) = (shot.owner, shot.level);
    let Some(kind) = shot.shot_kind() else {
        return;
    };
    let Some(shot_cfg) = cfg.shot(kind) else {
        return;
    };

    let damage = world.damage_thing(victim, shot_cfg.damage);
    let turn = world.turn;
    world.push_event(GameEvent::new(
        turn,
        EventPriority::Combat,
        GameEventData::ShotHit { kind, target: victim, damage },
    ));
    if let Some(sample) = shot_cfg.hit_sound {
        world.push_event(GameEvent::sound(turn, sample, Some(victim)));
    }
    if let Some(spell) = shot_cfg.spell {
        crate::game::spell::apply_spell(world, cfg, victim, spell, level, owner);
    }
    let victim_pos = world.thing(victim).map(|t| t.pos);
    let victim_owner = world.thing(victim).map(|t| t.owner);
    for player in [Some(owner), victim_owner].into_iter().flatten() {
        if let (Some(p), Some(pos)) = (world.player_mut(player), victim_pos) {
            p.last_battle = Some(pos);
        }
    }
    if let Some(thing) = world.thing_mut(shot_h) {
        thing.doomed = true;
    }
}

fn zero_blocked_axes(thing: &mut Thing, flags: BlockFlags) {
    if flags.contains(BlockFlags::X) {
        thing.velocity.x = 0;
        thing.accel.x = 0;
    }
    if flags.contains(BlockFlags::Y) {
        thing.velocity.y = 0;
        thing.accel.y = 0;
    }
    if flags.contains(BlockFlags::Z) {
        thing.velocity.z = 0;
        thing.accel.z = 0;
    }
}

fn settle_vertical(map: &MapGrid, thing: &mut Thing, flying: bool) {
    let floor = floor_height_under(map, thing, thing.pos);
    if !flying && thing.pos.z <= floor && floor - thing.pos.z <= STEP_HEIGHT {
        thing.pos.z = floor;
        thing.velocity.z = 0;
        thing.move_flags |= MoveFlags::GROUNDED;
    } else {
        thing.move_flags -= MoveFlags::GROUNDED;
    }
    if flying {
        let top = ceiling_height_above(map, thing, thing.pos) - thing.clipbox_size_yz;
        if top >= floor {
            thing.pos.z = thing.pos.z.min(top).max(floor);
        }
    }
}

fn unembed(map: &MapGrid, cfg: &SimConfig, thing: &mut Thing, outcome: MoveOutcome) -> MoveOutcome {
    if !thing_in_wall_at(map, thing, thing.pos) {
        return outcome;
    }
    match find_nearest_free_position(map, thing, thing.pos, cfg.rules.relocate_search_radius) {
        Some(pos) => {
            let pos = if thing.is_flying() {
                pos.with_z(thing.pos.z.max(pos.z).min(ceiling_height_above(map, thing, pos) - thing.clipbox_size_yz))
            } else {
                pos
            };
            thing.pos = pos;
            thing.velocity = Coord3d::ZERO;
            MoveOutcome::Relocated(pos)
        }
        None => MoveOutcome::Stranded,
    }
}

// =============================================================================
// TESTS
// =============================================================================
