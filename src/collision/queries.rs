use glam::DVec2;

use crate::{
    core::{
        collider::{ColliderId, StaticCollider},
        entity::{Entity, EntityId},
    },
    utils::allocator::Arena,
};

/// Result of a point query against colliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderHit {
    pub collider_id: ColliderId,
    /// Nearest point on the collider's center line.
    pub point: DVec2,
    pub distance: f64,
}

/// Point hit-testing used by editor tools.
pub struct PointQuery;

impl PointQuery {
    /// Entity whose disc contains `point`. When discs overlap, the one
    /// latest in `order` wins, mirroring draw order.
    pub fn entity_at(entities: &Arena<Entity>, order: &[EntityId], point: DVec2) -> Option<EntityId> {
        order
            .iter()
            .rev()
            .copied()
            .find(|id| entities.get(*id).is_some_and(|entity| entity.contains_point(point)))
    }

    /// All colliders within `thickness / 2 + tolerance` of `point`, nearest first.
    pub fn colliders_near(
        colliders: &Arena<StaticCollider>,
        point: DVec2,
        tolerance: f64,
    ) -> Vec<ColliderHit> {
        let mut hits: Vec<ColliderHit> = colliders
            .iter()
            .filter_map(|(collider_id, collider)| {
                let projected = collider.project(point);
                let distance = projected.distance(point);
                (distance <= collider.thickness() / 2.0 + tolerance).then_some(ColliderHit {
                    collider_id,
                    point: projected,
                    distance,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}
