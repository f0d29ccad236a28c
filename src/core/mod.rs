//! Core types describing simulated entities, composite bodies, and static geometry.

pub mod body;
pub mod collider;
pub mod entity;

pub use body::{BodyId, BodyShape, BodySpec, CompositeBody, LayoutEdge};
pub use collider::{ColliderId, ColliderShape, ColliderSpec, Curve, Ground, StaticCollider};
pub use entity::{Entity, EntityDesc, EntityId, Target};
