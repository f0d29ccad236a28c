//! Collision support: entity-pair broad phase and point queries.

pub mod broadphase;
pub mod queries;

pub use broadphase::{BroadPhase, SpatialGrid};
pub use queries::{ColliderHit, PointQuery};
