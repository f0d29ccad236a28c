//! verlet2d – a fixed-step 2D particle and distance-constraint solver.
//!
//! Composite bodies (circles, squares, triangles, ropes) are built from point
//! masses wired together by distance constraints, and collide with each other
//! and with static ground segments and arcs. A [`World`] owns the simulation
//! state and advances it one tick at a time; [`PhysicsEngine`] drives a world
//! from a host timer.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

use std::time::Duration;

pub use glam::DVec2;

pub use collision::queries::{ColliderHit, PointQuery};
pub use config::{BroadPhaseMode, WorldConfig};
pub use core::{
    body::{BodyId, BodyShape, BodySpec, CompositeBody},
    collider::{ColliderId, ColliderShape, ColliderSpec, Curve, Ground, StaticCollider},
    entity::{Entity, EntityDesc, EntityId, Target},
};
pub use dynamics::{
    effects::{Attractor, Booster, Effect, EffectId, EntityEffect, Spawner},
    integrator::Integrator,
    solver::{Contact, PositionSolver, SolverStepMetrics},
};
pub use error::{PhysicsError, Result};
pub use utils::{
    allocator::{Arena, Handle},
    profiling::StepProfile,
};
pub use world::{
    BodySnapshot, CommandQueue, CommandSender, EntitySnapshot, TargetSnapshot, World,
    WorldCommand, WorldObserver, WorldSnapshot,
};

/// Whether a [`PhysicsEngine`] advances its world on `advance` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

/// High-level driver that owns a [`World`] and runs it at a fixed tick rate.
pub struct PhysicsEngine {
    world: World,
    commands: CommandQueue,
    state: EngineState,
    accumulator: Duration,
}

impl PhysicsEngine {
    /// Creates a stopped engine around an empty world.
    pub fn new(config: WorldConfig) -> Result<Self> {
        Ok(Self::from_world(World::new(config)?))
    }

    pub fn from_world(world: World) -> Self {
        Self {
            world,
            commands: CommandQueue::new(),
            state: EngineState::Stopped,
            accumulator: Duration::ZERO,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn into_world(self) -> World {
        self.world
    }

    /// Handle for queueing world edits from other threads. Commands are
    /// applied at the next tick boundary.
    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn start(&mut self) {
        if self.state == EngineState::Running {
            return;
        }
        self.state = EngineState::Running;
        self.accumulator = Duration::ZERO;
        log::debug!("engine started at {} ticks/s", self.world.config().pps);
    }

    pub fn stop(&mut self) {
        if self.state == EngineState::Stopped {
            return;
        }
        self.state = EngineState::Stopped;
        self.accumulator = Duration::ZERO;
        log::debug!("engine stopped after {} ticks", self.world.tick());
    }

    /// Applies queued commands, then advances exactly one tick in either state.
    pub fn step(&mut self) {
        self.world.apply_commands(&self.commands);
        self.world.step();
    }

    /// Feeds wall-clock time to a running engine and runs every whole tick
    /// that fits, up to `max_ticks_per_advance`. Returns the number of ticks run.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        if self.state != EngineState::Running {
            return 0;
        }

        let tick = Duration::from_secs_f64(self.world.config().dt()).max(Duration::from_nanos(1));
        let cap = self.world.config().max_ticks_per_advance;
        self.accumulator += elapsed;

        let mut ticks = 0;
        while self.accumulator >= tick && ticks < cap {
            self.step();
            self.accumulator -= tick;
            ticks += 1;
        }

        if self.accumulator >= tick {
            let dropped = self.accumulator.as_nanos() / tick.as_nanos();
            log::warn!("simulation is falling behind, dropping {dropped} ticks");
            self.accumulator =
                Duration::from_nanos((self.accumulator.as_nanos() % tick.as_nanos()) as u64);
        }
        ticks
    }

    /// Enables or disables parallel execution of the per-entity passes.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.world.set_parallel_enabled(enabled);
    }

    /// Returns whether the engine is currently using parallel execution.
    pub fn parallel_enabled(&self) -> bool {
        self.world.parallel_enabled()
    }
}
