use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::{
    config::MAX_ROTATION_SPEED,
    core::body::BodyId,
    error::{ensure, Result},
    utils::allocator::Handle,
};

/// Handle of an [`Entity`] inside a [`crate::World`].
pub type EntityId = Handle<Entity>;

/// One side of a distance-constraint edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub entity: EntityId,
    pub rest_distance: f64,
    pub stiffness: f64,
}

/// Initial state of an entity, as supplied by body factories and snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDesc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub position: DVec2,
    #[serde(default)]
    pub velocity: DVec2,
    pub radius: f64,
    pub mass: f64,
    pub stiffness: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub rotation_speed: f64,
}

impl EntityDesc {
    pub fn new(position: DVec2, radius: f64, mass: f64, stiffness: f64) -> Self {
        Self {
            name: None,
            position,
            velocity: DVec2::ZERO,
            radius,
            mass,
            stiffness,
            rotation: 0.0,
            rotation_speed: 0.0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_velocity(mut self, velocity: DVec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Rejects out-of-range physical parameters; values are never clamped.
    pub fn validate(&self) -> Result<()> {
        ensure("position.x", self.position.x, |_| true)?;
        ensure("position.y", self.position.y, |_| true)?;
        ensure("velocity.x", self.velocity.x, |_| true)?;
        ensure("velocity.y", self.velocity.y, |_| true)?;
        ensure("radius", self.radius, |v| v >= 0.0)?;
        ensure("mass", self.mass, |v| v >= 0.0)?;
        ensure("stiffness", self.stiffness, |v| (0.0..=1.0).contains(&v))?;
        ensure("rotation", self.rotation, |_| true)?;
        ensure("rotation_speed", self.rotation_speed, |_| true)?;
        Ok(())
    }
}

/// A point mass: the smallest simulated unit.
///
/// `velocity` is derived from `position - previous_position` once per tick and
/// is what the next integration consumes. Identity and physical parameters are
/// fixed at construction so the world's name index and validation stay intact.
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    parent: BodyId,
    pub position: DVec2,
    pub previous_position: DVec2,
    pub velocity: DVec2,
    /// Heuristic spin angle in degrees.
    pub rotation: f64,
    /// Degrees per second.
    pub rotation_speed: f64,
    radius: f64,
    mass: f64,
    stiffness: f64,
    pub targets: Vec<Target>,
}

impl Entity {
    pub fn new(name: String, parent: BodyId, desc: &EntityDesc) -> Result<Self> {
        desc.validate()?;
        Ok(Self {
            name,
            parent,
            position: desc.position,
            previous_position: desc.position,
            velocity: desc.velocity,
            rotation: desc.rotation,
            rotation_speed: desc.rotation_speed,
            radius: desc.radius,
            mass: desc.mass,
            stiffness: desc.stiffness,
            targets: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Body this entity belongs to.
    pub fn parent(&self) -> BodyId {
        self.parent
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// `0` for immovable anchors, `1 / mass` otherwise.
    pub fn inv_mass(&self) -> f64 {
        if self.mass == 0.0 {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    pub fn is_immovable(&self) -> bool {
        self.mass == 0.0
    }

    /// Snapshots the current position and advances it by the carried velocity.
    pub fn integrate(&mut self, dt: f64) {
        self.previous_position = self.position;
        self.position += self.velocity * dt;
    }

    pub fn integrate_rotation(&mut self, dt: f64) {
        self.rotation += self.rotation_speed * dt;
    }

    /// Derives velocity from the positional change of this tick, adds the
    /// gravity kick for movable entities, then applies friction damping.
    pub fn update_velocity(&mut self, dt: f64, gravity: f64, friction: f64) {
        self.velocity = (self.position - self.previous_position) / dt;
        if self.mass != 0.0 {
            self.velocity.y += gravity * dt;
        }

        let rate = friction * self.radius * self.mass;
        self.velocity -= self.velocity * rate * dt;
        self.rotation_speed -= self.rotation_speed * rate * dt;
        self.rotation_speed = self
            .rotation_speed
            .clamp(-MAX_ROTATION_SPEED, MAX_ROTATION_SPEED);
    }

    pub fn target(&self, id: EntityId) -> Option<&Target> {
        self.targets.iter().find(|target| target.entity == id)
    }

    /// Adds an edge unless one to the same peer already exists.
    pub fn add_target(&mut self, target: Target) -> bool {
        if self.target(target.entity).is_some() {
            return false;
        }
        self.targets.push(target);
        true
    }

    pub fn remove_target(&mut self, id: EntityId) -> bool {
        let before = self.targets.len();
        self.targets.retain(|target| target.entity != id);
        self.targets.len() != before
    }

    pub fn contains_point(&self, point: DVec2) -> bool {
        self.position.distance_squared(point) <= self.radius * self.radius
    }

    /// Current state as a descriptor, for cloning and snapshots.
    pub fn to_desc(&self) -> EntityDesc {
        EntityDesc {
            name: Some(self.name.clone()),
            position: self.position,
            velocity: self.velocity,
            radius: self.radius,
            mass: self.mass,
            stiffness: self.stiffness,
            rotation: self.rotation,
            rotation_speed: self.rotation_speed,
        }
    }
}
