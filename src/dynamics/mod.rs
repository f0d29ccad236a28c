//! Simulation dynamics: integration, position relaxation, and velocity effects.

pub mod effects;
pub mod integrator;
pub mod solver;

pub use effects::{
    Attractor, Booster, Effect, EffectId, EntityEffect, EntityScript, ScriptRegistry, Spawner,
};
pub use integrator::Integrator;
pub use solver::{Contact, PositionSolver, SolverStepMetrics};
