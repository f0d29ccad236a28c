use approx::assert_relative_eq;
use verlet2d::dynamics::solver::{resolve_distance, resolve_pair};
use verlet2d::*;

fn entity(position: DVec2, radius: f64, mass: f64, stiffness: f64) -> Entity {
    Entity::new(
        "probe".to_string(),
        BodyId::new(0, 0),
        &EntityDesc::new(position, radius, mass, stiffness),
    )
    .expect("valid entity")
}

fn still_world() -> World {
    World::new(WorldConfig {
        gravity: 0.0,
        friction: 0.0,
        ..WorldConfig::default()
    })
    .expect("valid config")
}

#[test]
fn test_anchors_never_move() {
    let mut world = World::new(WorldConfig::default()).expect("valid config");
    let anchor = world
        .spawn_body(BodySpec::circle(DVec2::ZERO, 10.0, 0.0, 1.0))
        .expect("anchor");
    world
        .spawn_body(BodySpec::circle(DVec2::new(3.0, -30.0), 10.0, 1.0, 1.0))
        .expect("ball");
    let rope = world
        .spawn_body(
            BodySpec::rope(DVec2::new(-60.0, -40.0), DVec2::new(60.0, -40.0), 6.0, 1.0, 1.0)
                .pinned(true, true),
        )
        .expect("rope");

    let pinned: Vec<(EntityId, DVec2)> = {
        let body = world.body(rope).expect("rope body");
        [body.entities[0], body.entities[body.entities.len() - 1]]
            .into_iter()
            .map(|id| (id, world.entity(id).expect("pin").position))
            .collect()
    };

    for _ in 0..200 {
        world.step();
    }

    assert_eq!(world.body_position(anchor), Some(DVec2::ZERO));
    for (id, start) in pinned {
        assert_eq!(world.entity(id).expect("pin").position, start);
    }
}

#[test]
fn test_stretched_constraint_converges_monotonically() {
    let mut a = entity(DVec2::ZERO, 1.0, 1.0, 1.0);
    let mut b = entity(DVec2::new(40.0, 0.0), 1.0, 3.0, 1.0);
    let rest = 10.0;

    let mut error = (a.position.distance(b.position) - rest).abs();
    for _ in 0..40 {
        resolve_distance(&mut a, &mut b, rest, 0.5);
        resolve_distance(&mut b, &mut a, rest, 0.5);
        let next = (a.position.distance(b.position) - rest).abs();
        assert!(next <= error + 1e-12, "error grew from {error} to {next}");
        error = next;
    }
    assert!(error < 1e-6, "residual {error}");
}

#[test]
fn test_full_stiffness_constraint_reaches_rest_length_in_one_tick() {
    let mut world = still_world();
    let a = world
        .spawn_body(BodySpec::circle(DVec2::ZERO, 2.0, 1.0, 1.0))
        .expect("a");
    let b = world
        .spawn_body(BodySpec::circle(DVec2::new(20.0, 0.0), 2.0, 1.0, 1.0))
        .expect("b");
    let ea = world.body(a).expect("a").entities[0];
    let eb = world.body(b).expect("b").entities[0];
    world.connect(ea, eb, 1.0).expect("connect");

    world.entity_mut(eb).expect("b").position.x = 50.0;
    world.step();

    let pa = world.entity(ea).expect("a").position;
    let pb = world.entity(eb).expect("b").position;
    let distance = pa.distance(pb);
    assert_relative_eq!(distance, 20.0, epsilon = 1e-6);
}

#[test]
fn test_overlapping_pair_is_separated() {
    let cases = [
        (DVec2::new(5.0, 0.0), 1.0, 1.0),
        (DVec2::new(3.0, 4.0), 2.0, 0.5),
        (DVec2::new(-1.0, 7.0), 10.0, 1.0),
        (DVec2::new(0.5, -0.5), 1.0, 4.0),
    ];
    for (offset, mass_a, mass_b) in cases {
        let mut a = entity(DVec2::ZERO, 6.0, mass_a, 1.0);
        let mut b = entity(offset, 4.0, mass_b, 1.0);
        assert!(resolve_pair(&mut a, &mut b));
        let distance = a.position.distance(b.position);
        assert!(distance >= 10.0 - 1e-4, "{offset:?}: distance {distance}");
    }
}

#[test]
fn test_ground_projection_clamps_to_endpoints() {
    let ground = Ground::new(DVec2::new(0.0, 0.0), DVec2::new(100.0, 50.0), 4.0).expect("ground");

    assert_eq!(ground.project(DVec2::new(-30.0, -10.0)), ground.start());
    assert_eq!(ground.project(DVec2::new(200.0, 90.0)), ground.end());

    let midpoint = DVec2::new(50.0, 25.0);
    let normal = DVec2::new(-50.0, 100.0).normalize() * 7.0;
    let projected = ground.project(midpoint + normal);
    assert_relative_eq!(projected.x, 50.0, epsilon = 1e-9);
    assert_relative_eq!(projected.y, 25.0, epsilon = 1e-9);
}

#[test]
fn test_free_fall_matches_constant_acceleration() {
    let mut world = World::new(WorldConfig {
        friction: 0.0,
        ..WorldConfig::default()
    })
    .expect("valid config");
    let ball = world
        .spawn_body(BodySpec::circle(DVec2::ZERO, 1.0, 10.0, 0.5))
        .expect("ball");

    let ticks = 90;
    for _ in 0..ticks {
        world.step();
    }

    let dt = world.config().dt();
    let g = world.config().gravity;
    let y = world.body_position(ball).expect("ball").y;

    // Gravity enters the velocity one tick before it moves the body.
    let n = ticks as f64;
    assert_relative_eq!(y, g * dt * dt * n * (n - 1.0) / 2.0, max_relative = 1e-9);

    let t = n * dt;
    assert_relative_eq!(y, 0.5 * g * t * t, max_relative = 0.02);
}

#[test]
fn test_pinned_rope_sags_in_the_middle() {
    let mut world = World::new(WorldConfig::default()).expect("valid config");
    let rope = world
        .spawn_body(
            BodySpec::rope(DVec2::ZERO, DVec2::new(80.0, 0.0), 10.0, 1.0, 0.5).pinned(true, true),
        )
        .expect("rope");
    assert_eq!(world.body(rope).expect("rope").entities.len(), 5);

    for _ in 0..200 {
        world.step();
    }

    let ids = world.body(rope).expect("rope").entities.clone();
    let y = |id: EntityId| world.entity(id).expect("rope entity").position.y;
    assert_eq!(y(ids[0]), 0.0);
    assert_eq!(y(ids[4]), 0.0);
    assert!(y(ids[2]) > y(ids[0]), "midpoint at {}", y(ids[2]));
    assert!(y(ids[1]) > 0.0 && y(ids[3]) > 0.0);
}

#[test]
fn test_circle_comes_to_rest_on_ground() {
    let mut world = World::new(WorldConfig::default()).expect("valid config");
    let ground = world
        .spawn_collider(
            ColliderSpec::ground(DVec2::new(-200.0, 0.0), DVec2::new(200.0, 0.0), 4.0)
                .expect("ground"),
        )
        .expect("collider");
    let ball = world
        .spawn_body(BodySpec::circle(DVec2::new(0.0, -50.0), 10.0, 1.0, 0.5))
        .expect("ball");

    for _ in 0..600 {
        world.step();
    }

    let position = world.body_position(ball).expect("ball");
    let surface = world.collider(ground).expect("ground").project(position);
    assert_relative_eq!(position.distance(surface), 12.0, epsilon = 0.1);
    assert!(world.body_velocity(ball).expect("ball").length() < 10.0);
}

#[test]
fn test_ball_rolls_along_a_curve() {
    let mut world = World::new(WorldConfig::default()).expect("valid config");
    let bowl = world
        .spawn_collider(
            ColliderSpec::curve(
                DVec2::new(-100.0, 0.0),
                DVec2::new(0.0, 100.0),
                DVec2::new(100.0, 0.0),
                4.0,
            )
            .expect("curve"),
        )
        .expect("collider");
    let ball = world
        .spawn_body(BodySpec::circle(DVec2::new(-60.0, 40.0), 8.0, 1.0, 0.5))
        .expect("ball");

    for _ in 0..900 {
        world.step();
    }

    let position = world.body_position(ball).expect("ball");
    let curve = world.collider(bowl).expect("curve");
    // Still riding the inside of the bowl.
    assert!(position.y > 40.0 && position.y < 100.0, "{position:?}");
    assert_relative_eq!(position.distance(curve.project(position)), 10.0, epsilon = 1.0);
}

fn grid_scene(broad_phase: BroadPhaseMode) -> Vec<(DVec2, DVec2)> {
    let mut world = World::new(WorldConfig {
        broad_phase,
        ..WorldConfig::default()
    })
    .expect("valid config");
    world
        .spawn_collider(
            ColliderSpec::ground(DVec2::new(0.0, 200.0), DVec2::new(4096.0, 200.0), 4.0)
                .expect("ground"),
        )
        .expect("collider");
    for k in 0..6 {
        let x = 128.0 + 90.0 * k as f64;
        world
            .spawn_body(BodySpec::triangle(DVec2::new(x, 120.0), 20.0, 3.0, 0.6))
            .expect("triangle");
        world
            .spawn_body(BodySpec::circle(DVec2::new(x + 4.0, 90.0), 8.0, 1.0, 0.4))
            .expect("circle");
        world
            .spawn_body(BodySpec::square(DVec2::new(x + 30.0, 100.0), 18.0, 4.0, 0.5))
            .expect("square");
    }
    for _ in 0..120 {
        world.step();
    }
    world
        .entities()
        .map(|(_, entity)| (entity.position, entity.velocity))
        .collect()
}

#[test]
fn test_grid_broad_phase_matches_brute_force() {
    let brute = grid_scene(BroadPhaseMode::BruteForce);
    for cell_size in [7.0, 24.0, 256.0] {
        let grid = grid_scene(BroadPhaseMode::UniformGrid { cell_size });
        assert_eq!(brute, grid, "cell size {cell_size}");
    }
}

#[test]
fn test_grid_resolves_contacts_pushed_across_cells() {
    let chain = |broad_phase: BroadPhaseMode| {
        let mut world = World::new(WorldConfig {
            gravity: 0.0,
            friction: 0.0,
            iterations: 1,
            broad_phase,
            ..WorldConfig::default()
        })
        .expect("valid config");
        for (x, mass) in [(0.0, 0.0), (6.0, 1.0), (16.5, 1.0)] {
            world
                .spawn_body(BodySpec::circle(DVec2::new(x, 0.0), 5.0, mass, 1.0))
                .expect("circle");
        }
        world.step();
        world
            .entities()
            .map(|(_, entity)| entity.position)
            .collect::<Vec<_>>()
    };

    let brute = chain(BroadPhaseMode::BruteForce);
    let grid = chain(BroadPhaseMode::UniformGrid { cell_size: 11.2 });
    // The middle circle only reaches the last one's cell after being pushed off the anchor.
    assert!(brute[2].x > 16.5, "{brute:?}");
    assert_eq!(brute, grid);
}

#[test]
fn test_grid_handles_entities_larger_than_the_grid_span() {
    let scene = |broad_phase: BroadPhaseMode| {
        let mut world = World::new(WorldConfig {
            broad_phase,
            ..WorldConfig::default()
        })
        .expect("valid config");
        world
            .spawn_body(BodySpec::circle(DVec2::new(0.0, 5_000.0), 4_990.0, 0.0, 1.0))
            .expect("planet");
        for i in 0..8 {
            world
                .spawn_body(BodySpec::circle(
                    DVec2::new(-70.0 + 20.0 * i as f64, -40.0),
                    6.0,
                    1.0,
                    0.5,
                ))
                .expect("pebble");
        }
        for _ in 0..90 {
            world.step();
        }
        world
            .entities()
            .map(|(_, entity)| entity.position)
            .collect::<Vec<_>>()
    };

    let brute = scene(BroadPhaseMode::BruteForce);
    let grid = scene(BroadPhaseMode::UniformGrid { cell_size: 16.0 });
    assert_eq!(brute, grid);
    assert!(grid[1..].iter().all(|p| p.y < 10.0), "{grid:?}");
}
