//! Turn pipeline and sync codec throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dungeon_core::{
    config::{CreatureKind, SpellKind},
    core::coord::SubtileCoord,
    game::{
        map::{MapGrid, SlabKind},
        script::NoScripts,
        spell::apply_spell,
    },
    sync::display::{display_instrs, DisplayState},
    tick, PlayerId, SimConfig, SyncChannel, World,
};

fn populated_world(cfg: &SimConfig) -> World {
    let mut world = World::new(MapGrid::new(24, 24, SlabKind::Path), &cfg.rules, 42);
    world.add_player(PlayerId(0));
    world.add_player(PlayerId(1));
    for i in 0..64 {
        let owner = PlayerId((i % 2) as u8);
        let stl = SubtileCoord::new(4 + (i % 8) * 8, 4 + (i / 8) * 8);
        let Ok(h) = world.create_creature(cfg, CreatureKind::Dwarf, owner, stl.center(0), 0) else {
            continue;
        };
        if i % 3 == 0 {
            apply_spell(&mut world, cfg, h, SpellKind::Speed, 1, owner);
        }
        if let Some(ctrl) = world.control_mut(h) {
            ctrl.move_target = Some(SubtileCoord::new(68 - (i % 8) * 8, 68 - (i / 8) * 8).center(0));
        }
    }
    world
}

fn bench_tick(c: &mut Criterion) {
    let cfg = SimConfig::default();
    let base = populated_world(&cfg);

    c.bench_function("tick_64_creatures", |b| {
        let mut world = base.clone();
        b.iter(|| black_box(tick(&mut world, &cfg, &mut NoScripts)))
    });
}

fn bench_display_sync(c: &mut Criterion) {
    let cfg = SimConfig::default();
    let mut world = populated_world(&cfg);
    let mut sender = SyncChannel::new(display_instrs());

    c.bench_function("display_encode", |b| {
        b.iter(|| {
            tick(&mut world, &cfg, &mut NoScripts);
            let live = DisplayState::capture(&world);
            black_box(sender.encode(&live))
        })
    });
}

criterion_group!(benches, bench_tick, bench_display_sync);
criterion_main!(benches);
