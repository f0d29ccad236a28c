//! Headless demo: a pinned rope bridge catches falling crates while the
//! engine is driven from a wall-clock loop and fed commands from another thread.

use std::thread;
use std::time::{Duration, Instant};

use verlet2d::*;

struct ImpactCounter {
    ground_hits: usize,
}

impl WorldObserver for ImpactCounter {
    fn on_hit_ground(&mut self, _world: &World, _entity: EntityId, _collider: ColliderId) {
        self.ground_hits += 1;
    }

    fn on_update(&mut self, world: &World) {
        if world.tick() % 90 == 0 {
            println!(
                "tick {:>4}: {} bodies, {} ground contacts so far",
                world.tick(),
                world.body_count(),
                self.ground_hits
            );
        }
    }
}

fn main() -> verlet2d::Result<()> {
    let mut engine = PhysicsEngine::new(WorldConfig::default())?;
    let world = engine.world_mut();

    world.spawn_collider(
        ColliderSpec::ground(DVec2::new(-400.0, 300.0), DVec2::new(400.0, 300.0), 8.0)?
            .with_name("floor"),
    )?;
    world.spawn_collider(ColliderSpec::curve(
        DVec2::new(180.0, 120.0),
        DVec2::new(260.0, 220.0),
        DVec2::new(380.0, 260.0),
        6.0,
    )?)?;
    world.spawn_body(
        BodySpec::rope(DVec2::new(-200.0, 100.0), DVec2::new(200.0, 100.0), 8.0, 1.0, 0.9)
            .pinned(true, true)
            .with_name("bridge"),
    )?;
    world.add_effect(Effect::Spawner(Spawner::new(
        BodySpec::square(DVec2::new(0.0, -150.0), 24.0, 4.0, 0.5),
        60,
    )))?;
    world.add_observer(Box::new(ImpactCounter { ground_hits: 0 }));

    let sender = engine.command_sender();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        sender.send(WorldCommand::SpawnBody(
            BodySpec::triangle(DVec2::new(-120.0, -200.0), 30.0, 3.0, 0.6).with_name("wedge"),
        ));
    });

    engine.start();
    let started = Instant::now();
    let mut last = started;
    while started.elapsed() < Duration::from_secs(3) {
        thread::sleep(Duration::from_millis(4));
        let now = Instant::now();
        engine.advance(now - last);
        last = now;
    }
    engine.stop();

    let world = engine.world();
    if let Some(bridge) = world.body_by_name("bridge") {
        if let Some(center) = world.body_position(bridge) {
            println!("bridge center sagged to y = {:.1}", center.y);
        }
    }
    println!("snapshot: {} bytes of JSON", world.to_json()?.len());
    Ok(())
}
