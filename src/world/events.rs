use crate::core::{collider::ColliderId, entity::EntityId};

use super::World;

/// Receives tick and contact notifications from a [`World`].
///
/// Hit callbacks fire once per distinct contact per tick, right after the
/// relaxation passes. `on_update` fires at the end of every tick.
pub trait WorldObserver: Send {
    fn on_update(&mut self, _world: &World) {}

    fn on_hit_entity(&mut self, _world: &World, _source: EntityId, _target: EntityId) {}

    fn on_hit_ground(&mut self, _world: &World, _entity: EntityId, _collider: ColliderId) {}
}
