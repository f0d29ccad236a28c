//! Serializable world state.
//!
//! A snapshot stores full entity state, so restoring one and stepping it
//! reproduces the trajectory of the world it was taken from. Constraint
//! edges are stored by entity name.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::{
    config::WorldConfig,
    core::{
        body::{BodyId, BodyShape, CompositeBody},
        collider::ColliderSpec,
        entity::{Entity, EntityDesc, Target},
    },
    dynamics::effects::Effect,
    error::{ensure, PhysicsError, Result},
};

use super::World;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub entity: String,
    pub rest_distance: f64,
    pub stiffness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub name: String,
    pub position: DVec2,
    pub previous_position: DVec2,
    pub velocity: DVec2,
    pub rotation: f64,
    pub rotation_speed: f64,
    pub radius: f64,
    pub mass: f64,
    pub stiffness: f64,
    #[serde(default)]
    pub targets: Vec<TargetSnapshot>,
}

impl EntitySnapshot {
    fn capture(entity: &Entity, world: &World) -> Self {
        Self {
            name: entity.name().to_string(),
            position: entity.position,
            previous_position: entity.previous_position,
            velocity: entity.velocity,
            rotation: entity.rotation,
            rotation_speed: entity.rotation_speed,
            radius: entity.radius(),
            mass: entity.mass(),
            stiffness: entity.stiffness(),
            targets: entity
                .targets
                .iter()
                .filter_map(|target| {
                    world.entity(target.entity).map(|peer| TargetSnapshot {
                        entity: peer.name().to_string(),
                        rest_distance: target.rest_distance,
                        stiffness: target.stiffness,
                    })
                })
                .collect(),
        }
    }

    fn restore(&self, parent: BodyId) -> Result<Entity> {
        let desc = EntityDesc {
            name: Some(self.name.clone()),
            position: self.position,
            velocity: self.velocity,
            radius: self.radius,
            mass: self.mass,
            stiffness: self.stiffness,
            rotation: self.rotation,
            rotation_speed: self.rotation_speed,
        };
        let mut entity = Entity::new(self.name.clone(), parent, &desc)?;
        ensure("previous_position.x", self.previous_position.x, |_| true)?;
        ensure("previous_position.y", self.previous_position.y, |_| true)?;
        entity.previous_position = self.previous_position;
        Ok(entity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub name: String,
    pub shape: BodyShape,
    pub mass: f64,
    pub stiffness: f64,
    pub entities: Vec<EntitySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub gravity: f64,
    pub friction: f64,
    #[serde(default)]
    pub bodies: Vec<BodySnapshot>,
    #[serde(default)]
    pub colliders: Vec<ColliderSpec>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl WorldSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl World {
    /// Captures bodies in solver order along with colliders and effects.
    pub fn snapshot(&self) -> WorldSnapshot {
        let bodies = self
            .bodies()
            .map(|(_, body)| BodySnapshot {
                name: body.name.clone(),
                shape: body.shape,
                mass: body.mass,
                stiffness: body.stiffness,
                entities: body
                    .entities
                    .iter()
                    .filter_map(|&id| self.entities.get(id))
                    .map(|entity| EntitySnapshot::capture(entity, self))
                    .collect(),
            })
            .collect();

        WorldSnapshot {
            gravity: self.config.gravity,
            friction: self.config.friction,
            bodies,
            colliders: self
                .colliders
                .iter()
                .map(|(_, collider)| ColliderSpec {
                    name: Some(collider.name.clone()),
                    shape: collider.shape,
                })
                .collect(),
            effects: self.effects.iter().map(|(_, effect)| effect.clone()).collect(),
        }
    }

    /// Rebuilds a world. Gravity and friction come from the snapshot, every
    /// other setting from `config`.
    pub fn from_snapshot(snapshot: &WorldSnapshot, config: WorldConfig) -> Result<World> {
        let mut world = World::new(WorldConfig {
            gravity: snapshot.gravity,
            friction: snapshot.friction,
            ..config
        })?;

        for body in &snapshot.bodies {
            world.restore_body(body)?;
        }
        for body in &snapshot.bodies {
            for state in &body.entities {
                world.restore_targets(state)?;
            }
        }
        for collider in &snapshot.colliders {
            world.spawn_collider(collider.clone())?;
        }
        for effect in &snapshot.effects {
            world.add_effect(effect.clone())?;
        }

        world.rebuild_order();
        log::debug!(
            "restored {} bodies, {} entities from snapshot",
            world.body_count(),
            world.entity_count()
        );
        Ok(world)
    }

    pub fn to_json(&self) -> Result<String> {
        self.snapshot().to_json()
    }

    pub fn from_json(json: &str, config: WorldConfig) -> Result<World> {
        World::from_snapshot(&WorldSnapshot::from_json(json)?, config)
    }

    fn restore_body(&mut self, snapshot: &BodySnapshot) -> Result<()> {
        if snapshot.entities.is_empty() {
            return Err(PhysicsError::Snapshot(format!(
                "body {} has no entities",
                snapshot.name
            )));
        }
        ensure("mass", snapshot.mass, |v| v >= 0.0)?;
        ensure("stiffness", snapshot.stiffness, |v| (0.0..=1.0).contains(&v))?;

        let name = self.claim_body_name(Some(snapshot.name.as_str()), snapshot.shape.kind_name())?;
        let body_id = self.bodies.next_handle();
        let entities = snapshot
            .entities
            .iter()
            .map(|state| state.restore(body_id))
            .collect::<Result<Vec<_>>>()?;
        self.check_entity_names(entities.iter().map(Entity::name))?;

        let ids = entities
            .into_iter()
            .map(|entity| self.insert_entity(entity))
            .collect();
        self.bodies.insert(CompositeBody {
            name: name.clone(),
            shape: snapshot.shape,
            mass: snapshot.mass,
            stiffness: snapshot.stiffness,
            entities: ids,
        });
        self.body_names.insert(name, body_id);
        self.body_order.push(body_id);
        Ok(())
    }

    fn restore_targets(&mut self, state: &EntitySnapshot) -> Result<()> {
        let id = self
            .entity_by_name(&state.name)
            .ok_or_else(|| PhysicsError::UnknownEntity(state.name.clone()))?;

        let mut targets = Vec::with_capacity(state.targets.len());
        for target in &state.targets {
            let peer = self.entity_by_name(&target.entity).ok_or_else(|| {
                PhysicsError::Snapshot(format!(
                    "{} targets unknown entity {}",
                    state.name, target.entity
                ))
            })?;
            ensure("rest_distance", target.rest_distance, |v| v >= 0.0)?;
            ensure("stiffness", target.stiffness, |v| (0.0..=1.0).contains(&v))?;
            targets.push(Target {
                entity: peer,
                rest_distance: target.rest_distance,
                stiffness: target.stiffness,
            });
        }

        if let Some(entity) = self.entities.get_mut(id) {
            for target in targets {
                entity.add_target(target);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::body::BodySpec;

    #[test]
    fn snapshot_preserves_constraint_graph_by_name() {
        let mut world = World::new(WorldConfig::default()).expect("config");
        world
            .spawn_body(BodySpec::triangle(DVec2::ZERO, 20.0, 3.0, 0.7).with_name("tri"))
            .expect("triangle");

        let snapshot = world.snapshot();
        assert_eq!(snapshot.bodies.len(), 1);
        let apex = &snapshot.bodies[0].entities[0];
        let peers: Vec<&str> = apex.targets.iter().map(|t| t.entity.as_str()).collect();
        assert_eq!(peers, vec!["tri.1", "tri.2"]);

        let restored = World::from_snapshot(&snapshot, WorldConfig::default()).expect("restore");
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn unknown_target_names_are_rejected() {
        let mut world = World::new(WorldConfig::default()).expect("config");
        world
            .spawn_body(BodySpec::square(DVec2::ZERO, 20.0, 4.0, 0.5).with_name("box"))
            .expect("square");

        let mut snapshot = world.snapshot();
        snapshot.bodies[0].entities[0].targets[0].entity = "nobody".into();
        let err = World::from_snapshot(&snapshot, WorldConfig::default())
            .err()
            .expect("restore must fail");
        assert!(matches!(err, PhysicsError::Snapshot(_)));
    }

    #[test]
    fn malformed_json_surfaces_as_json_error() {
        let err = World::from_json("{ not json", WorldConfig::default())
            .err()
            .expect("parse must fail");
        assert!(matches!(err, PhysicsError::Json(_)));
    }
}
