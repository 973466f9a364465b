//! Cast Dispatch
//!
//! Single entry point for keeper powers. A request is validated against
//! the power's target categories, paid for, then handed to its effect
//! producer.
//!
//! ```text
//!   request ──▶ available? ──▶ target ok? ──▶ pay ──▶ producer ──▶ cooldown
//!                   │              │           │         │
//!                 177 sound      119 sound   message   refund
//! ```

use bitflags::bitflags;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CastFlags, PowerEffect, PowerFlags, PowerKind, PricingRule, SimConfig, MAGIC_OVERCHARGE_LEVELS, SPELL_MAX_LEVEL};
use crate::core::coord::SubtileCoord;
use crate::game::events::{EventPriority, GameEvent, GameEventData, RejectReason};
use crate::game::map::{MapFlags, SlabKind};
use crate::game::player::{PlayerId, PlayerMessage, Relation};
use crate::game::powers::use_power;
use crate::game::script::ScriptHost;
use crate::game::thing::{CreatureState, ObjectKind, ThingClass, ThingHandle, ThingModel};
use crate::game::world::{World, WorldError};

bitflags! {
    /// Options for [`can_cast_spell`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CastCheckFlags: u8 {
        /// Do not require the power to be unlocked
        const SKIP_AVAILABILITY = 0x01;
        /// Ignore the thing conditions
        const SKIP_THING        = 0x02;
        /// Last check before casting; refusals are logged
        const FINAL             = 0x04;
    }
}

bitflags! {
    /// Modifiers for [`magic_use_power`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CastModFlags: u8 {
        /// Skip payment
        const CAST_FOR_FREE = 0x01;
    }
}

/// Where a power is aimed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastTarget {
    /// Target subtile
    pub stl: Option<SubtileCoord>,
    /// Target thing
    pub thing: Option<ThingHandle>,
}

impl CastTarget {
    /// No target (level-wide powers).
    pub fn none() -> Self {
        Self::default()
    }

    /// Aim at a subtile.
    pub fn at(stl: SubtileCoord) -> Self {
        Self { stl: Some(stl), thing: None }
    }

    /// Aim at a thing standing on a subtile.
    pub fn on_thing(thing: ThingHandle, stl: SubtileCoord) -> Self {
        Self { stl: Some(stl), thing: Some(thing) }
    }
}

/// Why a cast failed.
#[derive(Debug, Error)]
pub enum CastError {
    /// Power not unlocked for the caster
    #[error("power {0:?} is not available")]
    Unavailable(PowerKind),

    /// Treasury cannot cover the price
    #[error("not enough gold: price {price}, treasury {gold}")]
    NotEnoughGold {
        /// Price asked
        price: i64,
        /// Gold held
        gold: i64,
    },

    /// Target conditions not met
    #[error("power {0:?} cannot target that")]
    InvalidTarget(PowerKind),

    /// Power has no registered effect
    #[error("power {0:?} has no effect producer")]
    NoEffectProducer(PowerKind),

    /// Script handler declined the request
    #[error("script {id} refused the cast")]
    ScriptRefused {
        /// Script id
        id: u16,
    },

    /// Power has no configuration row
    #[error("unknown power {0:?}")]
    UnknownPower(PowerKind),

    /// Caster is not a player in this world
    #[error("unknown player {0:?}")]
    UnknownPlayer(PlayerId),

    /// World refused a creation
    #[error(transparent)]
    World(#[from] WorldError),
}

// =============================================================================
// TARGET CHECKS
// =============================================================================

fn cooling_down(world: &World, player: PlayerId) -> bool {
    world
        .player(player)
        .map(|p| world.turn <= p.power_cooldown_turn)
        .unwrap_or(false)
}

/// Whether `player` may cast `power` at a subtile. `allow` loosens the
/// power's own categories.
pub fn can_cast_power_at_xy(
    world: &World,
    cfg: &SimConfig,
    player: PlayerId,
    power: PowerKind,
    stl: SubtileCoord,
    allow: CastFlags,
) -> bool {
    let (Some(pc), Some(block)) = (cfg.power(power), world.map.block(stl)) else {
        return false;
    };
    let can_cast = pc.can_cast | allow;

    if !can_cast.contains(CastFlags::UNREVEALED) && !block.is_revealed(player) {
        let temp = block.flags.contains(MapFlags::REVEALED_TEMP);
        if !can_cast.contains(CastFlags::REVEALED_TEMP) || !temp {
            return false;
        }
    }
    if can_cast.contains(CastFlags::ANYWHERE) {
        return true;
    }
    if can_cast.contains(CastFlags::NEEDS_DELAY) && cooling_down(world, player) {
        return false;
    }

    let relation = match block.owner {
        Some(owner) => world.relation(player, owner),
        None => Relation::Neutral,
    };
    let unclaimed = matches!(block.slab, SlabKind::Path | SlabKind::Water | SlabKind::Lava);

    if block.blocks_movement() && !unclaimed {
        if can_cast.contains(CastFlags::CLAIMABLE) && !block.slab.is_claimable_tall() {
            return false;
        }
        if can_cast.contains(CastFlags::ALL_TALL) {
            return true;
        }
        match relation {
            Relation::Neutral => can_cast.contains(CastFlags::NEUTRL_TALL),
            Relation::Owned => can_cast.contains(CastFlags::OWNED_TALL),
            Relation::Allied => can_cast.contains(CastFlags::ALLIED_TALL),
            Relation::Enemy => can_cast.contains(CastFlags::ENEMY_TALL),
        }
    } else {
        let liquid = matches!(block.slab, SlabKind::Water | SlabKind::Lava);
        if can_cast.contains(CastFlags::CLAIMABLE) && liquid {
            return false;
        }
        if can_cast.contains(CastFlags::ALL_GROUND) {
            return true;
        }
        if unclaimed {
            return can_cast.contains(CastFlags::UNCLMD_GROUND);
        }
        match relation {
            Relation::Neutral => can_cast.contains(CastFlags::NEUTRL_GROUND),
            Relation::Owned => can_cast.contains(CastFlags::OWNED_GROUND),
            Relation::Allied => can_cast.contains(CastFlags::ALLIED_GROUND),
            Relation::Enemy => can_cast.contains(CastFlags::ENEMY_GROUND),
        }
    }
}

/// Whether `player` may cast `power` on a thing.
pub fn can_cast_power_on_thing(world: &World, cfg: &SimConfig, player: PlayerId, h: ThingHandle, power: PowerKind) -> bool {
    let (Some(pc), Some(thing)) = (cfg.power(power), world.thing(h)) else {
        return false;
    };
    // Things in a hand are out of reach
    if thing.picked_up || !thing.is_active() {
        return false;
    }
    let flags = pc.can_cast;
    if flags.contains(CastFlags::NEEDS_DELAY) && cooling_down(world, player) {
        return false;
    }
    let relation = world.relation(player, thing.owner);

    match (thing.class, thing.model) {
        (ThingClass::Object, ThingModel::Object(kind)) => {
            let (owned, neutral, enemy) = match kind {
                ObjectKind::Food => (CastFlags::OWNED_FOOD, CastFlags::NEUTRL_FOOD, CastFlags::ENEMY_FOOD),
                ObjectKind::GoldPile => (CastFlags::OWNED_GOLD, CastFlags::NEUTRL_GOLD, CastFlags::ENEMY_GOLD),
                ObjectKind::SpellBook => (CastFlags::OWNED_SPELL, CastFlags::empty(), CastFlags::empty()),
            };
            match relation {
                Relation::Owned => flags.intersects(owned),
                Relation::Neutral => flags.intersects(neutral),
                Relation::Enemy | Relation::Allied => flags.intersects(enemy),
            }
        }
        (ThingClass::Shot, ThingModel::Shot(kind)) => {
            let boulder = cfg.shot(kind).map(|s| s.boulder).unwrap_or(false);
            boulder && relation == Relation::Owned && flags.contains(CastFlags::OWNED_BOULDERS)
        }
        (ThingClass::Creature, _) => {
            let Some(ctrl) = world.control(h) else {
                return false;
            };
            // Own creatures held by an enemy are out of our control
            if thing.owner == player && ctrl.custody.is_some_and(|p| p != player) {
                return false;
            }
            if flags.contains(CastFlags::ALL_CRTRS) {
                return true;
            }
            if !flags.contains(CastFlags::NCONSC_CRTRS) && (ctrl.state == CreatureState::Unconscious || thing.health <= 0) {
                debug!("player {} cannot cast {:?} on unconscious {:?}", player.0, power, h);
                return false;
            }
            if !flags.contains(CastFlags::BOUND_CRTRS) && ctrl.is_bound() {
                debug!("player {} cannot cast {:?} on bound {:?}", player.0, power, h);
                return false;
            }
            if flags.contains(CastFlags::CUSTODY_CRTRS) && ctrl.custody == Some(player) {
                return true;
            }
            match relation {
                Relation::Owned => flags.contains(CastFlags::OWNED_CRTRS),
                Relation::Allied => flags.contains(CastFlags::ALLIED_CRTRS),
                Relation::Enemy => flags.contains(CastFlags::ENEMY_CRTRS),
                Relation::Neutral => false,
            }
        }
        _ => false,
    }
}

/// Whether `player` may cast `power` at a target.
///
/// Map and thing checks must both pass unless the power is `THING_OR_MAP`.
/// Parent powers additionally need one child that would pass on its own.
pub fn can_cast_spell(
    world: &World,
    cfg: &SimConfig,
    player: PlayerId,
    power: PowerKind,
    target: CastTarget,
    flags: CastCheckFlags,
) -> bool {
    let Some(pc) = cfg.power(power) else {
        return false;
    };
    if !flags.contains(CastCheckFlags::SKIP_AVAILABILITY)
        && !world.player(player).map(|p| p.has_power(power)).unwrap_or(false)
    {
        return false;
    }

    let cast_at_xy = match target.stl {
        Some(stl) => can_cast_power_at_xy(world, cfg, player, power, stl, CastFlags::empty()),
        None => pc.can_cast.contains(CastFlags::ANYWHERE),
    };
    let cast_on_thing = if pc.can_cast.intersects(CastFlags::ALL_THINGS) && !flags.contains(CastCheckFlags::SKIP_THING) {
        match target.thing {
            Some(h) if world.thing(h).is_some() => can_cast_power_on_thing(world, cfg, player, h, power),
            _ => false,
        }
    } else {
        true
    };

    let passed = if pc.can_cast.contains(CastFlags::THING_OR_MAP) {
        cast_at_xy || cast_on_thing
    } else {
        cast_at_xy && cast_on_thing
    };
    if !passed {
        if flags.contains(CastCheckFlags::FINAL) {
            let what = if !cast_on_thing { "a thing" } else { "a subtile" };
            warn!("player {} tried to cast {:?} on {} which can't be targeted", player.0, power, what);
        }
        return false;
    }

    if pc.flags.contains(PowerFlags::IS_PARENT) {
        let child_flags = flags - CastCheckFlags::FINAL;
        let any_child = cfg
            .children_of(power)
            .any(|child| can_cast_spell(world, cfg, player, child, target, child_flags));
        if !any_child {
            if flags.contains(CastCheckFlags::FINAL) {
                warn!("player {} tried to cast {:?}; child powers do not allow that", player.0, power);
            }
            return false;
        }
    }
    true
}

// =============================================================================
// PRICING
// =============================================================================

/// Current price of a power at a level.
pub fn compute_power_price(world: &World, cfg: &SimConfig, player: PlayerId, power: PowerKind, level: u8) -> i64 {
    let Some(pc) = cfg.power(power) else {
        return 0;
    };
    let level = (level as usize).min(MAGIC_OVERCHARGE_LEVELS - 1);
    let base = pc.cost[level] as i64;
    let step = pc.cost[0] as i64;
    match pc.pricing {
        PricingRule::Flat => base,
        PricingRule::Diggers => {
            let diggers = world.count_creatures(player, |c| cfg.creature(c.kind).map(|s| s.is_digger).unwrap_or(false));
            let cheaper = world.player(player).map(|p| p.cheaper_diggers).unwrap_or(0);
            let amount = (diggers as i64 - cheaper as i64).max(0);
            base + step * amount
        }
        PricingRule::Population { kind, divisor } => {
            let count = world.count_creatures(player, |c| c.kind == kind) as i64;
            base + step * (count / divisor.max(1) as i64)
        }
    }
}

/// Take the price of a power from the caster's treasury.
///
/// Refusals tell a local human keeper there is not enough gold.
pub fn pay_for_power(world: &mut World, cfg: &SimConfig, player: PlayerId, power: PowerKind, level: u8) -> Result<i64, CastError> {
    let price = compute_power_price(world, cfg, player, power, level);
    let turn = world.turn;
    let keeper = world.player_mut(player).ok_or(CastError::UnknownPlayer(player))?;
    if keeper.gold < price {
        let gold = keeper.gold;
        if keeper.is_local_human {
            world.push_event(GameEvent::new(
                turn,
                EventPriority::Feedback,
                GameEventData::Message { player, message: PlayerMessage::NotEnoughGold },
            ));
        }
        return Err(CastError::NotEnoughGold { price, gold });
    }
    keeper.gold -= price;
    Ok(price)
}

fn refund(world: &mut World, player: PlayerId, price: i64) {
    if let Some(keeper) = world.player_mut(player) {
        keeper.gold += price;
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Cast a power. Returns the price paid.
#[allow(clippy::too_many_arguments)]
pub fn magic_use_power(
    world: &mut World,
    cfg: &SimConfig,
    scripts: &mut dyn ScriptHost,
    player: PlayerId,
    power: PowerKind,
    level: u8,
    target: CastTarget,
    mods: CastModFlags,
) -> Result<i64, CastError> {
    let pc = cfg.power(power).ok_or(CastError::UnknownPower(power))?;
    let available = world
        .player(player)
        .ok_or(CastError::UnknownPlayer(player))?
        .has_power(power);
    let turn = world.turn;

    // 1. Availability
    if !available {
        world.push_event(GameEvent::sound(turn, cfg.rules.unavailable_sound, None));
        world.push_event(GameEvent::cast_rejected(turn, player, power, RejectReason::Unavailable));
        return Err(CastError::Unavailable(power));
    }

    // 2. Target, with the thing's own subtile where the power aims at things
    let mut target = target;
    if let Some(pos) = target.thing.and_then(|h| world.thing(h)).map(|t| t.pos) {
        if target.stl.is_none() || pc.can_cast.intersects(CastFlags::ALL_THINGS) {
            target.stl = Some(pos.subtile());
        }
    }
    let checks = CastCheckFlags::SKIP_AVAILABILITY | CastCheckFlags::FINAL;
    if !can_cast_spell(world, cfg, player, power, target, checks) {
        world.push_event(GameEvent::sound(turn, cfg.rules.rejection_sound, None));
        world.push_event(GameEvent::cast_rejected(turn, player, power, RejectReason::InvalidTarget));
        return Err(CastError::InvalidTarget(power));
    }
    if pc.effect == PowerEffect::None {
        warn!("player {} tried to cast {:?} which has no valid function", player.0, power);
        return Err(CastError::NoEffectProducer(power));
    }

    // 3. Payment
    let level = level.min(SPELL_MAX_LEVEL);
    let price = if mods.contains(CastModFlags::CAST_FOR_FREE) {
        0
    } else {
        match pay_for_power(world, cfg, player, power, level) {
            Ok(price) => price,
            Err(e) => {
                debug!("player {} cannot afford {:?}: {}", player.0, power, e);
                world.push_event(GameEvent::cast_rejected(turn, player, power, RejectReason::NotEnoughGold));
                return Err(e);
            }
        }
    };

    // 4. Effect
    if let Err(e) = use_power(world, cfg, scripts, player, power, level, target) {
        refund(world, player, price);
        debug!("{:?} by player {} failed after payment: {}", power, player.0, e);
        return Err(e);
    }

    // 5. Cooldown
    if let Some(keeper) = world.player_mut(player) {
        keeper.power_cooldown_turn = turn + pc.cooldown;
    }
    world.push_event(GameEvent::new(
        turn,
        EventPriority::Power,
        GameEventData::PowerCast { player, power, level, price },
    ));
    info!("player {} cast {:?} at level {} for {} gold", player.0, power, level, price);
    Ok(price)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CreatureKind, SpellFlags};
    use crate::game::map::MapGrid;
    use crate::game::script::NoScripts;

    const ME: PlayerId = PlayerId(0);
    const FOE: PlayerId = PlayerId(1);

    fn setup() -> (World, SimConfig) {
        let cfg = SimConfig::default();
        let mut world = World::new(MapGrid::new(8, 8, SlabKind::Path), &cfg.rules, 3);
        for id in [ME, FOE] {
            let p = world.add_player(id);
            p.gold = 5000;
            p.available_powers = PowerKind::ALL.iter().copied().collect();
        }
        world.map.reveal_all(ME);
        world.map.fill_slabs((0, 0), (3, 7), SlabKind::Claimed, Some(ME));
        world.map.fill_slabs((5, 0), (7, 7), SlabKind::Claimed, Some(FOE));
        (world, cfg)
    }

    fn creature(world: &mut World, cfg: &SimConfig, owner: PlayerId, stl: SubtileCoord) -> ThingHandle {
        world.create_creature(cfg, CreatureKind::Dwarf, owner, stl.center(0), 0).unwrap()
    }

    #[test]
    fn test_ground_categories() {
        let (world, cfg) = setup();
        // Create digger: own claimed ground only
        assert!(can_cast_power_at_xy(&world, &cfg, ME, PowerKind::CreateDigger, SubtileCoord::new(4, 4), CastFlags::empty()));
        assert!(!can_cast_power_at_xy(&world, &cfg, ME, PowerKind::CreateDigger, SubtileCoord::new(13, 4), CastFlags::empty()));
        assert!(!can_cast_power_at_xy(&world, &cfg, ME, PowerKind::CreateDigger, SubtileCoord::new(18, 4), CastFlags::empty()));
        // Loosened by allow flags
        assert!(can_cast_power_at_xy(&world, &cfg, ME, PowerKind::CreateDigger, SubtileCoord::new(13, 4), CastFlags::UNCLMD_GROUND));
    }

    #[test]
    fn test_unrevealed_rejected() {
        let (world, cfg) = setup();
        assert!(!can_cast_power_at_xy(&world, &cfg, FOE, PowerKind::CreateDigger, SubtileCoord::new(18, 4), CastFlags::empty()));
        // Sight works on unrevealed ground
        assert!(can_cast_power_at_xy(&world, &cfg, FOE, PowerKind::Sight, SubtileCoord::new(4, 4), CastFlags::empty()));
    }

    #[test]
    fn test_tall_categories() {
        let (mut world, cfg) = setup();
        world.map.set_slab(6, 6, SlabKind::Wall, Some(FOE));
        world.map.set_slab(4, 6, SlabKind::Rock, None);
        let wall = SubtileCoord::new(19, 19);
        assert!(can_cast_power_at_xy(&world, &cfg, ME, PowerKind::DestroyWalls, wall, CastFlags::empty()));
        assert!(!can_cast_power_at_xy(&world, &cfg, FOE, PowerKind::DestroyWalls, wall, CastFlags::empty()));
        // Rock is never claimable
        let rock = SubtileCoord::new(13, 19);
        assert!(!can_cast_power_at_xy(&world, &cfg, ME, PowerKind::DestroyWalls, rock, CastFlags::ALL_TALL));
    }

    #[test]
    fn test_delay_gate() {
        let (mut world, cfg) = setup();
        world.turn = 1;
        let stl = SubtileCoord::new(4, 4);
        assert!(can_cast_power_at_xy(&world, &cfg, ME, PowerKind::Lightning, stl, CastFlags::empty()));
        world.player_mut(ME).unwrap().power_cooldown_turn = 10;
        world.turn = 10;
        assert!(!can_cast_power_at_xy(&world, &cfg, ME, PowerKind::Lightning, stl, CastFlags::empty()));
        world.turn = 11;
        assert!(can_cast_power_at_xy(&world, &cfg, ME, PowerKind::Lightning, stl, CastFlags::empty()));
    }

    #[test]
    fn test_creature_relations() {
        let (mut world, cfg) = setup();
        let mine = creature(&mut world, &cfg, ME, SubtileCoord::new(4, 4));
        let theirs = creature(&mut world, &cfg, FOE, SubtileCoord::new(16, 4));
        assert!(can_cast_power_on_thing(&world, &cfg, ME, mine, PowerKind::SpeedCreature));
        assert!(!can_cast_power_on_thing(&world, &cfg, ME, theirs, PowerKind::SpeedCreature));
        assert!(can_cast_power_on_thing(&world, &cfg, ME, theirs, PowerKind::Disease));
        assert!(!can_cast_power_on_thing(&world, &cfg, ME, mine, PowerKind::Disease));

        world.player_mut(ME).unwrap().allies.insert(FOE);
        assert!(can_cast_power_on_thing(&world, &cfg, ME, theirs, PowerKind::SpeedCreature));
    }

    #[test]
    fn test_custody_and_bound_state() {
        let (mut world, cfg) = setup();
        let mine = creature(&mut world, &cfg, ME, SubtileCoord::new(4, 4));
        let prisoner = creature(&mut world, &cfg, FOE, SubtileCoord::new(5, 4));

        world.control_mut(mine).unwrap().custody = Some(FOE);
        assert!(!can_cast_power_on_thing(&world, &cfg, ME, mine, PowerKind::Slap));

        assert!(!can_cast_power_on_thing(&world, &cfg, ME, prisoner, PowerKind::Slap));
        world.control_mut(prisoner).unwrap().custody = Some(ME);
        assert!(can_cast_power_on_thing(&world, &cfg, ME, prisoner, PowerKind::Slap));

        world.control_mut(mine).unwrap().custody = None;
        world.control_mut(mine).unwrap().timebomb_armed = true;
        assert!(!can_cast_power_on_thing(&world, &cfg, ME, mine, PowerKind::SpeedCreature));

        world.control_mut(mine).unwrap().timebomb_armed = false;
        world.control_mut(mine).unwrap().state = CreatureState::Unconscious;
        assert!(!can_cast_power_on_thing(&world, &cfg, ME, mine, PowerKind::SpeedCreature));
    }

    #[test]
    fn test_picked_up_thing_immune() {
        let (mut world, cfg) = setup();
        let mine = creature(&mut world, &cfg, ME, SubtileCoord::new(4, 4));
        world.thing_mut(mine).unwrap().picked_up = true;
        assert!(!can_cast_power_on_thing(&world, &cfg, ME, mine, PowerKind::Slap));
    }

    #[test]
    fn test_objects() {
        let (mut world, cfg) = setup();
        let gold = world.create_object(ObjectKind::GoldPile, PlayerId::NEUTRAL, SubtileCoord::new(4, 4).center(0)).unwrap();
        let food = world.create_object(ObjectKind::Food, FOE, SubtileCoord::new(5, 4).center(0)).unwrap();
        assert!(can_cast_power_on_thing(&world, &cfg, ME, gold, PowerKind::PickupGold));
        assert!(!can_cast_power_on_thing(&world, &cfg, ME, gold, PowerKind::PickupFood));
        assert!(!can_cast_power_on_thing(&world, &cfg, ME, food, PowerKind::PickupFood));
    }

    #[test]
    fn test_both_checks_required() {
        let (mut world, cfg) = setup();
        let theirs = creature(&mut world, &cfg, FOE, SubtileCoord::new(16, 4));
        let t = CastTarget::on_thing(theirs, SubtileCoord::new(16, 4));
        assert!(can_cast_spell(&world, &cfg, ME, PowerKind::Disease, t, CastCheckFlags::empty()));
        // Thing required but missing
        let bare = CastTarget::at(SubtileCoord::new(16, 4));
        assert!(!can_cast_spell(&world, &cfg, ME, PowerKind::Disease, bare, CastCheckFlags::empty()));
        // Skipping thing conditions leaves the map check
        assert!(can_cast_spell(&world, &cfg, ME, PowerKind::Disease, bare, CastCheckFlags::SKIP_THING));
    }

    #[test]
    fn test_thing_or_map() {
        let (mut world, mut cfg) = setup();
        cfg.powers.get_mut(&PowerKind::Disease).unwrap().can_cast =
            CastFlags::ENEMY_CRTRS | CastFlags::OWNED_GROUND | CastFlags::THING_OR_MAP;
        let theirs = creature(&mut world, &cfg, FOE, SubtileCoord::new(16, 4));
        // Enemy creature on enemy ground: thing passes, map fails
        let t = CastTarget::on_thing(theirs, SubtileCoord::new(16, 4));
        assert!(can_cast_spell(&world, &cfg, ME, PowerKind::Disease, t, CastCheckFlags::empty()));
        // Own ground without a thing: map passes
        let bare = CastTarget::at(SubtileCoord::new(4, 4));
        assert!(can_cast_spell(&world, &cfg, ME, PowerKind::Disease, bare, CastCheckFlags::empty()));
        let neither = CastTarget::at(SubtileCoord::new(16, 4));
        assert!(!can_cast_spell(&world, &cfg, ME, PowerKind::Disease, neither, CastCheckFlags::empty()));
    }

    #[test]
    fn test_availability_check() {
        let (mut world, cfg) = setup();
        world.player_mut(ME).unwrap().available_powers.remove(&PowerKind::Sight);
        let t = CastTarget::at(SubtileCoord::new(4, 4));
        assert!(!can_cast_spell(&world, &cfg, ME, PowerKind::Sight, t, CastCheckFlags::empty()));
        assert!(can_cast_spell(&world, &cfg, ME, PowerKind::Sight, t, CastCheckFlags::SKIP_AVAILABILITY));
    }

    #[test]
    fn test_parent_needs_a_child() {
        let (mut world, cfg) = setup();
        let gold = world.create_object(ObjectKind::GoldPile, ME, SubtileCoord::new(4, 4).center(0)).unwrap();
        let spellbook = world.create_object(ObjectKind::SpellBook, ME, SubtileCoord::new(5, 4).center(0)).unwrap();
        let on_gold = CastTarget::on_thing(gold, SubtileCoord::new(4, 4));
        let on_book = CastTarget::on_thing(spellbook, SubtileCoord::new(5, 4));
        // Hand accepts both, but no pickup child takes spell books
        assert!(can_cast_spell(&world, &cfg, ME, PowerKind::Hand, on_gold, CastCheckFlags::empty()));
        assert!(!can_cast_spell(&world, &cfg, ME, PowerKind::Hand, on_book, CastCheckFlags::empty()));
    }

    #[test]
    fn test_digger_price_scales() {
        let (mut world, cfg) = setup();
        assert_eq!(compute_power_price(&world, &cfg, ME, PowerKind::CreateDigger, 0), 300);
        for i in 0..3 {
            world.create_creature(&cfg, CreatureKind::Imp, ME, SubtileCoord::new(4 + i, 4).center(0), 0).unwrap();
        }
        assert_eq!(compute_power_price(&world, &cfg, ME, PowerKind::CreateDigger, 0), 1200);
        world.player_mut(ME).unwrap().cheaper_diggers = 2;
        assert_eq!(compute_power_price(&world, &cfg, ME, PowerKind::CreateDigger, 0), 600);
        world.player_mut(ME).unwrap().cheaper_diggers = 9;
        assert_eq!(compute_power_price(&world, &cfg, ME, PowerKind::CreateDigger, 0), 300);
    }

    #[test]
    fn test_population_price() {
        let (mut world, mut cfg) = setup();
        cfg.powers.get_mut(&PowerKind::Sight).unwrap().pricing =
            PricingRule::Population { kind: CreatureKind::Dwarf, divisor: 2 };
        for i in 0..5 {
            creature(&mut world, &cfg, ME, SubtileCoord::new(4 + i, 4));
        }
        // 300 + 150 * 1 at level 1, plus 300 * (5 / 2)
        assert_eq!(compute_power_price(&world, &cfg, ME, PowerKind::Sight, 1), 450 + 600);
    }

    #[test]
    fn test_insufficient_gold_changes_nothing() {
        let (mut world, cfg) = setup();
        let mine = creature(&mut world, &cfg, ME, SubtileCoord::new(4, 4));
        world.player_mut(ME).unwrap().gold = 100;
        world.player_mut(ME).unwrap().is_local_human = true;
        world.take_events();

        let result = magic_use_power(
            &mut world,
            &cfg,
            &mut NoScripts,
            ME,
            PowerKind::SpeedCreature,
            2,
            CastTarget::on_thing(mine, SubtileCoord::new(4, 4)),
            CastModFlags::empty(),
        );
        assert!(matches!(result, Err(CastError::NotEnoughGold { price: 400, gold: 100 })));
        assert_eq!(world.player(ME).unwrap().gold, 100);
        assert!(!world.control(mine).unwrap().has_flag(SpellFlags::SPEED));
        let events = world.take_events();
        assert!(events.iter().any(|e| matches!(
            e.data,
            GameEventData::Message { player: ME, message: PlayerMessage::NotEnoughGold }
        )));
    }

    #[test]
    fn test_not_enough_gold_message_only_for_local_human() {
        let (mut world, cfg) = setup();
        world.player_mut(FOE).unwrap().gold = 0;
        world.take_events();
        let result = pay_for_power(&mut world, &cfg, FOE, PowerKind::Sight, 0);
        assert!(result.is_err());
        assert!(world.take_events().is_empty());
    }

    #[test]
    fn test_successful_cast_charges_and_stamps_cooldown() {
        let (mut world, cfg) = setup();
        world.turn = 50;
        let price = magic_use_power(
            &mut world,
            &cfg,
            &mut NoScripts,
            ME,
            PowerKind::Lightning,
            1,
            CastTarget::at(SubtileCoord::new(4, 4)),
            CastModFlags::empty(),
        )
        .unwrap();
        assert_eq!(price, 250);
        let keeper = world.player(ME).unwrap();
        assert_eq!(keeper.gold, 4750);
        assert_eq!(keeper.power_cooldown_turn, 60);

        // Delay-gated until the cooldown passes
        let again = magic_use_power(
            &mut world,
            &cfg,
            &mut NoScripts,
            ME,
            PowerKind::Lightning,
            1,
            CastTarget::at(SubtileCoord::new(4, 4)),
            CastModFlags::empty(),
        );
        assert!(matches!(again, Err(CastError::InvalidTarget(PowerKind::Lightning))));
    }

    #[test]
    fn test_unavailable_power_sound() {
        let (mut world, cfg) = setup();
        world.player_mut(ME).unwrap().available_powers.clear();
        world.take_events();
        let result = magic_use_power(
            &mut world,
            &cfg,
            &mut NoScripts,
            ME,
            PowerKind::Obey,
            0,
            CastTarget::none(),
            CastModFlags::empty(),
        );
        assert!(matches!(result, Err(CastError::Unavailable(PowerKind::Obey))));
        let events = world.take_events();
        assert!(events
            .iter()
            .any(|e| e.data == GameEventData::SoundPlayed { sample: cfg.rules.unavailable_sound, thing: None }));
    }

    #[test]
    fn test_invalid_target_sound() {
        let (mut world, cfg) = setup();
        world.take_events();
        let result = magic_use_power(
            &mut world,
            &cfg,
            &mut NoScripts,
            ME,
            PowerKind::Slap,
            0,
            CastTarget::at(SubtileCoord::new(4, 4)),
            CastModFlags::empty(),
        );
        assert!(matches!(result, Err(CastError::InvalidTarget(PowerKind::Slap))));
        assert_eq!(world.player(ME).unwrap().gold, 5000);
        let events = world.take_events();
        assert!(events
            .iter()
            .any(|e| e.data == GameEventData::SoundPlayed { sample: 119, thing: None }));
    }

    #[test]
    fn test_free_cast() {
        let (mut world, cfg) = setup();
        let mine = creature(&mut world, &cfg, ME, SubtileCoord::new(4, 4));
        world.player_mut(ME).unwrap().gold = 0;
        let price = magic_use_power(
            &mut world,
            &cfg,
            &mut NoScripts,
            ME,
            PowerKind::Protect,
            0,
            CastTarget::on_thing(mine, SubtileCoord::new(4, 4)),
            CastModFlags::CAST_FOR_FREE,
        )
        .unwrap();
        assert_eq!(price, 0);
        assert!(world.control(mine).unwrap().has_flag(SpellFlags::ARMOUR));
    }

    #[test]
    fn test_script_refusal_refunds() {
        let (mut world, mut cfg) = setup();
        cfg.powers.get_mut(&PowerKind::Obey).unwrap().effect = PowerEffect::Script(4);
        cfg.powers.get_mut(&PowerKind::Obey).unwrap().cost = [200; MAGIC_OVERCHARGE_LEVELS];
        let result = magic_use_power(
            &mut world,
            &cfg,
            &mut NoScripts,
            ME,
            PowerKind::Obey,
            0,
            CastTarget::none(),
            CastModFlags::empty(),
        );
        assert!(matches!(result, Err(CastError::ScriptRefused { id: 4 })));
        assert_eq!(world.player(ME).unwrap().gold, 5000);
    }

    #[test]
    fn test_no_producer() {
        let (mut world, cfg) = setup();
        let gold = world.create_object(ObjectKind::GoldPile, ME, SubtileCoord::new(4, 4).center(0)).unwrap();
        let result = magic_use_power(
            &mut world,
            &cfg,
            &mut NoScripts,
            ME,
            PowerKind::Hand,
            0,
            CastTarget::on_thing(gold, SubtileCoord::new(4, 4)),
            CastModFlags::empty(),
        );
        assert!(matches!(result, Err(CastError::NoEffectProducer(PowerKind::Hand))));
    }
}
