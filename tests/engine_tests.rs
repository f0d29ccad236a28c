use std::thread;
use std::time::Duration;

use verlet2d::*;

fn tick_length(engine: &PhysicsEngine) -> Duration {
    Duration::from_secs_f64(engine.world().config().dt())
}

#[test]
fn test_engine_starts_stopped_and_toggles() {
    let mut engine = PhysicsEngine::new(WorldConfig::default()).expect("valid config");
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(!engine.is_running());

    engine.start();
    engine.start();
    assert!(engine.is_running());

    engine.stop();
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[test]
fn test_advance_only_runs_while_running() {
    let mut engine = PhysicsEngine::new(WorldConfig::default()).expect("valid config");
    let tick = tick_length(&engine);

    assert_eq!(engine.advance(tick * 3), 0);
    assert_eq!(engine.world().tick(), 0);

    engine.start();
    assert_eq!(engine.advance(tick * 3), 3);
    assert_eq!(engine.advance(tick / 2), 0);
    assert_eq!(engine.advance(tick - tick / 2), 1);
    assert_eq!(engine.world().tick(), 4);

    // Manual stepping works in either state.
    engine.stop();
    engine.step();
    assert_eq!(engine.world().tick(), 5);
}

#[test]
fn test_advance_drops_backlog_beyond_the_cap() {
    let mut engine = PhysicsEngine::new(WorldConfig {
        max_ticks_per_advance: 4,
        ..WorldConfig::default()
    })
    .expect("valid config");
    let tick = tick_length(&engine);
    engine.start();

    assert_eq!(engine.advance(Duration::from_secs(1)), 4);
    // The remaining backlog was discarded rather than replayed.
    assert_eq!(engine.advance(tick / 4), 0);
    assert_eq!(engine.world().tick(), 4);
}

#[test]
fn test_commands_apply_at_tick_boundaries() {
    let mut engine = PhysicsEngine::new(WorldConfig::default()).expect("valid config");
    let sender = engine.command_sender();

    let worker = thread::spawn(move || {
        sender.send(WorldCommand::SpawnBody(
            BodySpec::circle(DVec2::ZERO, 5.0, 1.0, 0.5).with_name("dropped"),
        ));
        sender.send(WorldCommand::SpawnCollider(
            ColliderSpec::ground(DVec2::new(-50.0, 40.0), DVec2::new(50.0, 40.0), 2.0)
                .expect("ground")
                .with_name("ledge"),
        ));
    });
    worker.join().expect("sender thread");

    assert_eq!(engine.world().body_count(), 0);
    engine.step();
    assert!(engine.world().body_by_name("dropped").is_some());
    assert!(engine.world().collider_by_name("ledge").is_some());

    engine
        .command_sender()
        .send(WorldCommand::DespawnBody("dropped".into()));
    // Failing commands are skipped without stopping the tick.
    engine
        .command_sender()
        .send(WorldCommand::DespawnBody("missing".into()));
    engine.step();
    assert_eq!(engine.world().body_count(), 0);
    assert_eq!(engine.world().tick(), 2);
}

#[test]
fn test_parallel_and_sequential_passes_agree() {
    let run = |parallel: bool| {
        let mut engine = PhysicsEngine::new(WorldConfig::default()).expect("valid config");
        engine.set_parallel_enabled(parallel);
        let world = engine.world_mut();
        world
            .spawn_collider(
                ColliderSpec::ground(DVec2::new(-500.0, 200.0), DVec2::new(500.0, 200.0), 4.0)
                    .expect("ground"),
            )
            .expect("collider");
        for i in 0..20 {
            let x = -300.0 + 30.0 * i as f64;
            world
                .spawn_body(BodySpec::square(DVec2::new(x, -(i as f64) * 7.0), 12.0, 4.0, 0.5))
                .expect("square");
        }
        for _ in 0..90 {
            engine.step();
        }
        engine
            .into_world()
            .entities()
            .map(|(_, entity)| (entity.position, entity.velocity))
            .collect::<Vec<_>>()
    };

    assert_eq!(run(true), run(false));
}
