//! Global configuration constants and the per-world configuration record.

use serde::{Deserialize, Serialize};

use crate::error::{ensure, Result};

/// Default number of simulation ticks per second.
pub const DEFAULT_PPS: f64 = 90.0;

/// Default gravitational acceleration along +Y (screen space, Y-down).
pub const DEFAULT_GRAVITY: f64 = 500.0;

/// Default friction coefficient; the per-entity damping rate is `friction * radius * mass`.
pub const DEFAULT_FRICTION: f64 = 0.001;

/// Number of relaxation passes performed per tick.
pub const DEFAULT_ITERATIONS: u32 = 3;

/// Bodies whose mean position leaves `[-map_size, map_size]` on either axis are pruned.
pub const DEFAULT_MAP_SIZE: f64 = 10_000.0;

/// Upper bound on `|rotation_speed|` after damping.
pub const MAX_ROTATION_SPEED: f64 = 500.0;

/// Guards the correction denominators against near-zero distances.
pub const CORRECTION_EPSILON: f64 = 1e-6;

/// Below this magnitude a vector is treated as zero by the rotation heuristic.
pub const ROTATION_EPSILON: f64 = 1e-9;

/// Default cell size for the uniform-grid broad phase.
pub const DEFAULT_GRID_CELL_SIZE: f64 = 64.0;

/// Entities whose bounding square spans more grid cells than this are kept in
/// an overflow list and paired with everything.
pub const MAX_GRID_CELLS_PER_ENTITY: i64 = 64;

/// Largest number of particles a single rope may be built from.
pub const MAX_ROPE_PARTICLES: usize = 4096;

/// Default cap on ticks run by a single `PhysicsEngine::advance` call.
pub const DEFAULT_MAX_TICKS_PER_ADVANCE: u32 = 8;

/// How entity-entity candidate pairs are generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BroadPhaseMode {
    /// Every unordered pair is tested.
    BruteForce,
    /// Pairs sharing a cell of a uniform grid are tested.
    UniformGrid { cell_size: f64 },
}

impl Default for BroadPhaseMode {
    fn default() -> Self {
        Self::BruteForce
    }
}

/// Tunables for a [`crate::World`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub pps: f64,
    pub gravity: f64,
    pub friction: f64,
    pub iterations: u32,
    pub map_size: f64,
    pub broad_phase: BroadPhaseMode,
    pub max_ticks_per_advance: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            pps: DEFAULT_PPS,
            gravity: DEFAULT_GRAVITY,
            friction: DEFAULT_FRICTION,
            iterations: DEFAULT_ITERATIONS,
            map_size: DEFAULT_MAP_SIZE,
            broad_phase: BroadPhaseMode::default(),
            max_ticks_per_advance: DEFAULT_MAX_TICKS_PER_ADVANCE,
        }
    }
}

impl WorldConfig {
    /// Fixed tick length in seconds.
    pub fn dt(&self) -> f64 {
        1.0 / self.pps
    }

    pub fn validate(&self) -> Result<()> {
        ensure("pps", self.pps, |v| v > 0.0)?;
        ensure("gravity", self.gravity, |_| true)?;
        ensure("friction", self.friction, |v| v >= 0.0)?;
        ensure("iterations", self.iterations as f64, |v| v >= 1.0)?;
        ensure("map_size", self.map_size, |v| v > 0.0)?;
        ensure("max_ticks_per_advance", self.max_ticks_per_advance as f64, |v| v >= 1.0)?;
        if let BroadPhaseMode::UniformGrid { cell_size } = self.broad_phase {
            ensure("cell_size", cell_size, |v| v > 0.0)?;
        }
        Ok(())
    }
}
