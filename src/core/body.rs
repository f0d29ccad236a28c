use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::{
    config::MAX_ROPE_PARTICLES,
    core::entity::{Entity, EntityDesc, EntityId},
    error::{ensure, PhysicsError, Result},
    utils::{
        allocator::{Arena, Handle},
        math::mean,
    },
};

/// Handle of a [`CompositeBody`] inside a [`crate::World`].
pub type BodyId = Handle<CompositeBody>;

/// Geometry that decides how a body is built out of entities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodyShape {
    /// One particle of radius `size`.
    Circle { position: DVec2, size: f64 },
    /// Four corner particles of radius `size / 2`, fully connected.
    Square { position: DVec2, size: f64 },
    /// Three particles of radius `size / 2`, apex up, fully connected.
    Triangle { position: DVec2, size: f64 },
    /// A chain of particles of radius `size` from `start` to `end`.
    Rope {
        start: DVec2,
        end: DVec2,
        size: f64,
        #[serde(default)]
        pin_start: bool,
        #[serde(default)]
        pin_end: bool,
    },
}

impl BodyShape {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Circle { .. } => "circle",
            Self::Square { .. } => "square",
            Self::Triangle { .. } => "triangle",
            Self::Rope { .. } => "rope",
        }
    }

    pub fn size(&self) -> f64 {
        match *self {
            Self::Circle { size, .. }
            | Self::Square { size, .. }
            | Self::Triangle { size, .. }
            | Self::Rope { size, .. } => size,
        }
    }

    /// Same shape moved by `offset`.
    pub fn translated(&self, offset: DVec2) -> Self {
        let mut shape = *self;
        match &mut shape {
            Self::Circle { position, .. }
            | Self::Square { position, .. }
            | Self::Triangle { position, .. } => *position += offset,
            Self::Rope { start, end, .. } => {
                *start += offset;
                *end += offset;
            }
        }
        shape
    }
}

/// Local constraint edge between two entities of the same body, by layout index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEdge {
    pub a: usize,
    pub b: usize,
    pub rest_distance: f64,
    pub stiffness: f64,
}

/// Parameters for spawning a composite body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub shape: BodyShape,
    pub mass: f64,
    pub stiffness: f64,
    #[serde(default)]
    pub velocity: DVec2,
}

impl BodySpec {
    pub fn new(shape: BodyShape, mass: f64, stiffness: f64) -> Self {
        Self {
            name: None,
            shape,
            mass,
            stiffness,
            velocity: DVec2::ZERO,
        }
    }

    pub fn circle(position: DVec2, size: f64, mass: f64, stiffness: f64) -> Self {
        Self::new(BodyShape::Circle { position, size }, mass, stiffness)
    }

    pub fn square(position: DVec2, size: f64, mass: f64, stiffness: f64) -> Self {
        Self::new(BodyShape::Square { position, size }, mass, stiffness)
    }

    pub fn triangle(position: DVec2, size: f64, mass: f64, stiffness: f64) -> Self {
        Self::new(BodyShape::Triangle { position, size }, mass, stiffness)
    }

    pub fn rope(start: DVec2, end: DVec2, size: f64, mass: f64, stiffness: f64) -> Self {
        Self::new(
            BodyShape::Rope {
                start,
                end,
                size,
                pin_start: false,
                pin_end: false,
            },
            mass,
            stiffness,
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_velocity(mut self, velocity: DVec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Pins rope ends by giving them zero mass. No effect on other shapes.
    pub fn pinned(mut self, start: bool, end: bool) -> Self {
        if let BodyShape::Rope {
            pin_start, pin_end, ..
        } = &mut self.shape
        {
            *pin_start = start;
            *pin_end = end;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure("size", self.shape.size(), |v| v > 0.0)?;
        ensure("mass", self.mass, |v| v >= 0.0)?;
        ensure("stiffness", self.stiffness, |v| (0.0..=1.0).contains(&v))?;
        ensure("velocity.x", self.velocity.x, |_| true)?;
        ensure("velocity.y", self.velocity.y, |_| true)?;
        if let BodyShape::Rope { start, end, .. } = self.shape {
            ensure("start.x", start.x, |_| true)?;
            ensure("start.y", start.y, |_| true)?;
            ensure("end.x", end.x, |_| true)?;
            ensure("end.y", end.y, |_| true)?;
        }
        Ok(())
    }

    /// Entities and constraint edges realizing this shape at rest.
    pub fn layout(&self) -> Result<(Vec<EntityDesc>, Vec<LayoutEdge>)> {
        self.validate()?;

        let particle = |position: DVec2, radius: f64, mass: f64| {
            EntityDesc::new(position, radius, mass, self.stiffness).with_velocity(self.velocity)
        };

        let layout = match self.shape {
            BodyShape::Circle { position, size } => {
                (vec![particle(position, size, self.mass)], Vec::new())
            }
            BodyShape::Square { position, size } => {
                let half = size / 2.0;
                let mut entities = Vec::with_capacity(4);
                for i in [-1.0, 1.0] {
                    for j in [-1.0, 1.0] {
                        entities.push(particle(
                            position + DVec2::new(i * half, j * half),
                            half,
                            self.mass / 4.0,
                        ));
                    }
                }
                let edges = fully_connected(&entities);
                (entities, edges)
            }
            BodyShape::Triangle { position, size } => {
                let half = size / 2.0;
                let sqrt3 = 3f64.sqrt();
                let mut entities = vec![particle(
                    position - DVec2::new(0.0, 2.0 / sqrt3 * half),
                    half,
                    self.mass / 3.0,
                )];
                for i in [-1.0, 1.0] {
                    entities.push(particle(
                        position + DVec2::new(i * half, half / sqrt3),
                        half,
                        self.mass / 3.0,
                    ));
                }
                let edges = fully_connected(&entities);
                (entities, edges)
            }
            BodyShape::Rope {
                start,
                end,
                size,
                pin_start,
                pin_end,
            } => {
                let span = end - start;
                let segments = (span.length() / (size * 2.0)).floor().max(1.0);
                if segments >= MAX_ROPE_PARTICLES as f64 {
                    return Err(PhysicsError::InvalidParameter {
                        field: "size",
                        value: size,
                    });
                }
                let count = segments as usize;
                let step = span / segments;

                let mut entities = Vec::with_capacity(count + 1);
                let mut edges = Vec::with_capacity(count);
                for i in 0..=count {
                    let pinned = (i == 0 && pin_start) || (i == count && pin_end);
                    let mass = if pinned { 0.0 } else { self.mass };
                    entities.push(particle(start + step * i as f64, size, mass));
                    if i > 0 {
                        edges.push(LayoutEdge {
                            a: i - 1,
                            b: i,
                            rest_distance: size * 2.0,
                            stiffness: self.stiffness,
                        });
                    }
                }
                (entities, edges)
            }
        };
        Ok(layout)
    }
}

/// Connects every pair with its initial separation as rest length.
fn fully_connected(entities: &[EntityDesc]) -> Vec<LayoutEdge> {
    let mut edges = Vec::new();
    for (a, source) in entities.iter().enumerate() {
        for (b, target) in entities.iter().enumerate().skip(a + 1) {
            edges.push(LayoutEdge {
                a,
                b,
                rest_distance: source.position.distance(target.position),
                stiffness: source.stiffness,
            });
        }
    }
    edges
}

/// A named cluster of entities wired together by distance constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeBody {
    pub name: String,
    pub shape: BodyShape,
    pub mass: f64,
    pub stiffness: f64,
    pub entities: Vec<EntityId>,
}

impl CompositeBody {
    fn live<'a>(&'a self, arena: &'a Arena<Entity>) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities.iter().filter_map(|id| arena.get(*id))
    }

    /// Mean position of the body's entities.
    pub fn position(&self, arena: &Arena<Entity>) -> Option<DVec2> {
        mean(self.live(arena).map(|entity| entity.position))
    }

    /// Mean velocity of the body's entities.
    pub fn velocity(&self, arena: &Arena<Entity>) -> Option<DVec2> {
        mean(self.live(arena).map(|entity| entity.velocity))
    }

    /// Mean heuristic rotation in degrees.
    pub fn rotation(&self, arena: &Arena<Entity>) -> Option<f64> {
        let (sum, count) = self
            .live(arena)
            .fold((0.0, 0usize), |(sum, count), entity| (sum + entity.rotation, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// Parameters that rebuild this body at its current mean position and velocity.
    pub fn to_spec(&self, arena: &Arena<Entity>) -> BodySpec {
        let shape = match (self.shape, self.position(arena)) {
            (BodyShape::Rope { .. }, _) | (_, None) => self.shape,
            (
                BodyShape::Circle { position, .. }
                | BodyShape::Square { position, .. }
                | BodyShape::Triangle { position, .. },
                Some(current),
            ) => self.shape.translated(current - position),
        };
        BodySpec {
            name: Some(self.name.clone()),
            shape,
            mass: self.mass,
            stiffness: self.stiffness,
            velocity: self.velocity(arena).unwrap_or(DVec2::ZERO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn square_has_four_fully_connected_corners() {
        let spec = BodySpec::square(DVec2::new(100.0, 100.0), 20.0, 8.0, 0.5);
        let (entities, edges) = spec.layout().expect("valid square");

        assert_eq!(entities.len(), 4);
        assert_eq!(edges.len(), 6);
        for entity in &entities {
            assert_eq!(entity.radius, 10.0);
            assert_eq!(entity.mass, 2.0);
        }
        for edge in &edges {
            let d = entities[edge.a].position.distance(entities[edge.b].position);
            assert_relative_eq!(edge.rest_distance, d);
        }
    }

    #[test]
    fn triangle_is_equilateral() {
        let spec = BodySpec::triangle(DVec2::ZERO, 30.0, 3.0, 1.0);
        let (entities, edges) = spec.layout().expect("valid triangle");

        assert_eq!(entities.len(), 3);
        assert_eq!(edges.len(), 3);
        for edge in &edges {
            assert_relative_eq!(edge.rest_distance, 30.0, epsilon = 1e-9);
        }
        assert!(entities[0].position.y < entities[1].position.y);
    }

    #[test]
    fn rope_links_neighbours_and_pins_ends() {
        let spec = BodySpec::rope(DVec2::ZERO, DVec2::new(80.0, 0.0), 10.0, 1.0, 1.0)
            .pinned(true, true);
        let (entities, edges) = spec.layout().expect("valid rope");

        assert_eq!(entities.len(), 5);
        assert_eq!(edges.len(), 4);
        assert_eq!(entities[0].mass, 0.0);
        assert_eq!(entities[4].mass, 0.0);
        assert_eq!(entities[2].mass, 1.0);
        assert!(edges.iter().all(|e| e.b == e.a + 1 && e.rest_distance == 20.0));
    }

    #[test]
    fn short_rope_still_has_two_particles() {
        let spec = BodySpec::rope(DVec2::ZERO, DVec2::new(5.0, 0.0), 10.0, 1.0, 1.0);
        let (entities, _) = spec.layout().expect("valid rope");
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn rope_with_too_many_particles_is_rejected() {
        let spec = BodySpec::rope(DVec2::ZERO, DVec2::new(1.0, 0.0), 1e-300, 1.0, 0.5);
        assert!(matches!(
            spec.layout(),
            Err(PhysicsError::InvalidParameter { field: "size", .. })
        ));

        let size = 1.0;
        let longest = 2.0 * size * (MAX_ROPE_PARTICLES - 1) as f64;
        let spec = BodySpec::rope(DVec2::ZERO, DVec2::new(longest, 0.0), size, 1.0, 0.5);
        let (entities, _) = spec.layout().expect("rope at the particle limit");
        assert_eq!(entities.len(), MAX_ROPE_PARTICLES);

        let spec = BodySpec::rope(DVec2::ZERO, DVec2::new(longest + 2.0, 0.0), size, 1.0, 0.5);
        assert!(spec.layout().is_err());
    }

    #[test]
    fn layout_rejects_invalid_parameters() {
        assert!(BodySpec::circle(DVec2::ZERO, 0.0, 1.0, 0.5).layout().is_err());
        assert!(BodySpec::circle(DVec2::ZERO, 1.0, -1.0, 0.5).layout().is_err());
        assert!(BodySpec::circle(DVec2::ZERO, 1.0, 1.0, 2.0).layout().is_err());
    }
}
