//! Dungeon Simulation Demo
//!
//! Builds a small two-keeper map, casts a few powers, runs the turn
//! pipeline while mirroring a display snapshot through the sync codec,
//! then replays from a checkpoint to confirm determinism.

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dungeon_core::{
    config::{CreatureKind, InstanceKind, PowerKind},
    core::{coord::SubtileCoord, rng::derive_level_seed},
    game::{
        cast::{magic_use_power, CastModFlags, CastTarget},
        events::GameEventData,
        instance::trigger_instance,
        map::{MapGrid, SlabKind},
        script::NoScripts,
        thing::{InstanceTarget, ThingClass, ThingHandle},
        tick::tick,
    },
    sync::display::{display_instrs, DisplayState},
    PlayerId, SimConfig, SyncChannel, World, TURNS_PER_SECOND, VERSION,
};

/// Turns simulated by the demo (30 seconds of game time).
const DEMO_TURNS: u32 = 600;

/// Level number mixed into the session seed.
const DEMO_LEVEL: u32 = 1;

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Dungeon Sim Core v{}", VERSION);
    info!("Turn rate: {} turns/s", TURNS_PER_SECOND);

    demo_match()
}

/// Build the demo map: open floor inside a rock border, with an earth
/// pillar in the middle.
fn build_map() -> MapGrid {
    let mut map = MapGrid::new(16, 16, SlabKind::Path);
    map.fill_slabs((0, 0), (15, 0), SlabKind::Rock, None);
    map.fill_slabs((0, 15), (15, 15), SlabKind::Rock, None);
    map.fill_slabs((0, 0), (0, 15), SlabKind::Rock, None);
    map.fill_slabs((15, 0), (15, 15), SlabKind::Rock, None);
    map.fill_slabs((7, 6), (8, 9), SlabKind::Earth, None);
    map
}

fn spawn_army(world: &mut World, cfg: &SimConfig, owner: PlayerId, column: i32) -> Result<Vec<ThingHandle>> {
    let kinds = [CreatureKind::Dwarf, CreatureKind::Warlock, CreatureKind::Fairy, CreatureKind::Imp];
    let mut out = Vec::new();
    for (i, kind) in kinds.into_iter().enumerate() {
        let stl = SubtileCoord::new(column, 8 + i as i32 * 8);
        let h = world.create_creature(cfg, kind, owner, stl.center(0), 1)?;
        out.push(h);
    }
    Ok(out)
}

fn cast(world: &mut World, cfg: &SimConfig, player: PlayerId, power: PowerKind, level: u8, target: CastTarget) {
    match magic_use_power(world, cfg, &mut NoScripts, player, power, level, target, CastModFlags::empty()) {
        Ok(price) => info!("Player {} cast {:?} (level {}) for {} gold", player.0, power, level, price),
        Err(e) => warn!("Player {} could not cast {:?}: {}", player.0, power, e),
    }
}

/// Demo function to exercise the simulation.
fn demo_match() -> Result<()> {
    info!("=== Starting Demo ===");

    let cfg = SimConfig::default();
    cfg.validate().context("built-in configuration is invalid")?;

    let session_seed = 12345u64;
    let seed = derive_level_seed(DEMO_LEVEL, session_seed);
    let mut world = World::new(build_map(), &cfg.rules, seed);
    info!("Session Seed: {}, Level {} Seed: {}", session_seed, DEMO_LEVEL, seed);

    let keeper = PlayerId(0);
    let rival = PlayerId(1);
    for id in [keeper, rival] {
        let player = world.add_player(id);
        player.gold = 5000;
        player.available_powers = cfg.powers.keys().copied().collect();
    }
    if let Some(player) = world.player_mut(keeper) {
        player.is_local_human = true;
    }
    world.map.reveal_all(keeper);
    world.map.reveal_all(rival);

    let ours = spawn_army(&mut world, &cfg, keeper, 8)?;
    let theirs = spawn_army(&mut world, &cfg, rival, 38)?;
    for (&a, &b) in ours.iter().zip(&theirs) {
        for (h, foe) in [(a, b), (b, a)] {
            let goal = world.thing(foe).map(|t| t.pos);
            if let Some(ctrl) = world.control_mut(h) {
                ctrl.move_target = goal;
            }
        }
    }
    info!("Spawned {} creatures", world.creatures().len());

    let mut sender = SyncChannel::new(display_instrs());
    let mut receiver = SyncChannel::new(display_instrs());
    let mut mirror = DisplayState::default();
    let mut wire_bytes = 0usize;

    let mut total_events = 0usize;
    let mut kills = 0usize;
    let mut checkpoint = None;

    for t in 1..=DEMO_TURNS {
        let result = tick(&mut world, &cfg, &mut NoScripts);
        total_events += result.events.len();
        kills += result
            .events
            .iter()
            .filter(|e| matches!(e.data, GameEventData::ThingKilled { class: ThingClass::Creature, .. }))
            .count();

        match t {
            1 => {
                // Opening moves
                let stl = world.thing(ours[0]).map(|t| t.pos.subtile()).unwrap_or_default();
                cast(&mut world, &cfg, keeper, PowerKind::SpeedCreature, 2, CastTarget::on_thing(ours[0], stl));
                let stl = world.thing(theirs[1]).map(|t| t.pos.subtile()).unwrap_or_default();
                cast(&mut world, &cfg, keeper, PowerKind::Lightning, 3, CastTarget::at(stl));
                let stl = world.thing(theirs[0]).map(|t| t.pos.subtile()).unwrap_or_default();
                cast(&mut world, &cfg, rival, PowerKind::Slap, 0, CastTarget::on_thing(theirs[0], stl));
            }
            40 => {
                if trigger_instance(&mut world, &cfg, ours[1], InstanceKind::Fireball, InstanceTarget::thing(theirs[1])) {
                    info!("Warlock {:?} started a fireball", ours[1]);
                }
            }
            100 => checkpoint = Some((world.checkpoint()?, world.compute_hash())),
            _ => {}
        }

        let live = DisplayState::capture(&world);
        let frame = sender.encode(&live)?;
        wire_bytes += frame.len();
        receiver.decode(&mut mirror, &frame)?;

        if t % 100 == 0 {
            info!(
                "Turn {}: {} creatures, {} rows mirrored, {} events so far",
                t,
                world.creatures().len(),
                mirror.occupied(),
                total_events
            );
        }
    }

    if mirror != DisplayState::capture(&world) {
        bail!("display mirror diverged from the world");
    }

    // Print final results
    info!("=== Results ===");
    let hash = world.compute_hash();
    info!("Final State Hash: {}", hex::encode(hash));
    info!("Creatures killed: {}", kills);
    info!("Total events: {}", total_events);
    info!("Display sync: {} frames, {} bytes", sender.frames(), wire_bytes);
    for (id, player) in &world.players {
        info!("Player {}: {} gold", id.0, player.gold);
    }

    // Verify determinism by replaying from the checkpoint
    info!("=== Verifying Determinism ===");
    let Some((snapshot, snapshot_hash)) = checkpoint else {
        bail!("no checkpoint was taken");
    };
    let mut replay = World::from_checkpoint(&snapshot)?;
    if replay.compute_hash() != snapshot_hash {
        bail!("checkpoint does not restore the recorded state");
    }
    while replay.turn < world.turn {
        tick(&mut replay, &cfg, &mut NoScripts);
    }
    let replay_hash = replay.compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
        Ok(())
    } else {
        bail!("determinism failure: hashes differ")
    }
}
