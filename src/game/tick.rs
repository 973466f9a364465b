//! Turn Pipeline
//!
//! Advances the whole world by one game turn. Must stay 100% deterministic:
//! things are visited in slot order and nothing reads the clock.

use tracing::{debug, error};

use crate::config::SimConfig;
use crate::game::events::GameEvent;
use crate::game::instance::advance_instance;
use crate::game::physics::move_thing;
use crate::game::script::ScriptHost;
use crate::game::spell::tick_spells;
use crate::game::thing::{ThingClass, ThingHandle};
use crate::game::world::World;

/// Result of a turn.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Turn that was simulated
    pub turn: u32,
    /// Events generated this turn
    pub events: Vec<GameEvent>,
    /// Things removed at the end of the turn
    pub removed: Vec<ThingHandle>,
    /// Instances whose action fired
    pub instances_fired: usize,
}

/// Run one game turn.
///
/// # Determinism
///
/// - Arenas iterate in slot order, players in id order
/// - Integer math only
/// - Randomness only from `world.rng`
pub fn tick(world: &mut World, cfg: &SimConfig, scripts: &mut dyn ScriptHost) -> TickResult {
    let mut result = TickResult::default();

    // 0. Advance turn counter
    world.turn += 1;
    result.turn = world.turn;

    let mut handles = world.things.handles();
    let bound = world.things.capacity();
    if handles.len() > bound {
        error!("thing list holds {} entries, more than capacity {}; truncating", handles.len(), bound);
        handles.truncate(bound);
    }

    // 1. Creature instances and spells
    for &h in &handles {
        if !world.is_active_creature(h) {
            continue;
        }
        if advance_instance(world, cfg, scripts, h) {
            result.instances_fired += 1;
        }
        tick_spells(world, cfg, h);
    }

    // 2. Movement, after this turn's status changes
    for &h in &handles {
        if world.thing(h).is_some() {
            move_thing(world, cfg, h);
        }
    }

    // 3. Lifespans of shots and free-standing effects
    for &h in &handles {
        let Some(thing) = world.thing_mut(h) else {
            continue;
        };
        let decays = match thing.class {
            ThingClass::Shot => true,
            ThingClass::Effect => thing.parent.is_none(),
            _ => false,
        };
        if decays {
            thing.health -= 1;
            if thing.health <= 0 {
                thing.doomed = true;
            }
        }
    }

    // 4. Remove the dead with full teardown
    let dead: Vec<ThingHandle> = world
        .things
        .iter()
        .filter(|(_, t)| t.doomed || t.health <= 0)
        .map(|(h, _)| h)
        .collect();
    for h in dead {
        if world.kill_thing(cfg, h) {
            result.removed.push(h);
        }
    }
    if !result.removed.is_empty() {
        debug!("turn {}: removed {} things", world.turn, result.removed.len());
    }

    result.events = world.take_events();
    result
}

/// Run several turns, collecting every event.
pub fn run_turns(world: &mut World, cfg: &SimConfig, scripts: &mut dyn ScriptHost, turns: u32) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for _ in 0..turns {
        events.extend(tick(world, cfg, scripts).events);
    }
    events
}

// =============================================================================
// TESTS
// =============================================================================
