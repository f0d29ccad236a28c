use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::{
    core::{body::BodySpec, entity::Entity},
    error::{ensure, Result},
    utils::allocator::Handle,
};

/// Handle of an [`Effect`] inside a [`crate::World`].
pub type EffectId = Handle<Effect>;

/// A region that changes the velocity of entities passing through it.
pub trait EntityEffect: Send + Sync {
    fn apply(&self, entity: &mut Entity);
}

/// Radial push out of (or, with negative speed, pull into) a disc.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attractor {
    pub position: DVec2,
    pub radius: f64,
    pub speed: f64,
}

impl EntityEffect for Attractor {
    fn apply(&self, entity: &mut Entity) {
        if entity.is_immovable() {
            return;
        }

        let offset = entity.position - self.position;
        let reach = entity.radius() + self.radius;
        if offset.x.abs() >= reach || offset.y.abs() >= reach {
            return;
        }

        let distance = offset.length();
        if distance == 0.0 || distance > reach {
            return;
        }
        entity.velocity += offset / distance * self.speed;
    }
}

/// Constant velocity kick for entities inside an axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Booster {
    pub start: DVec2,
    pub end: DVec2,
    pub velocity: DVec2,
}

impl EntityEffect for Booster {
    fn apply(&self, entity: &mut Entity) {
        if entity.is_immovable() {
            return;
        }

        let offset = (entity.position - (self.start + self.end) / 2.0).abs();
        let half = (self.start - self.end).abs() / 2.0;
        if offset.x >= half.x + entity.radius() || offset.y >= half.y + entity.radius() {
            return;
        }
        entity.velocity += self.velocity;
    }
}

/// Spawns a copy of `template` every `interval_ticks` ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spawner {
    pub template: BodySpec,
    pub interval_ticks: u32,
    #[serde(default)]
    pub elapsed_ticks: u32,
}

impl Spawner {
    pub fn new(template: BodySpec, interval_ticks: u32) -> Self {
        Self {
            template,
            interval_ticks,
            elapsed_ticks: 0,
        }
    }

    /// Advances the internal counter; returns a body to spawn when it fires.
    pub fn tick(&mut self) -> Option<BodySpec> {
        self.elapsed_ticks += 1;
        if self.elapsed_ticks < self.interval_ticks {
            return None;
        }
        self.elapsed_ticks = 0;
        Some(BodySpec {
            name: None,
            ..self.template.clone()
        })
    }
}

/// Any effect the world can host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Attractor(Attractor),
    Booster(Booster),
    Spawner(Spawner),
}

impl Effect {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Attractor(attractor) => {
                ensure("radius", attractor.radius, |v| v >= 0.0)?;
                ensure("speed", attractor.speed, |_| true)?;
                ensure("position.x", attractor.position.x, |_| true)?;
                ensure("position.y", attractor.position.y, |_| true)
            }
            Self::Booster(booster) => {
                for (field, value) in [
                    ("start.x", booster.start.x),
                    ("start.y", booster.start.y),
                    ("end.x", booster.end.x),
                    ("end.y", booster.end.y),
                    ("velocity.x", booster.velocity.x),
                    ("velocity.y", booster.velocity.y),
                ] {
                    ensure(field, value, |_| true)?;
                }
                Ok(())
            }
            Self::Spawner(spawner) => {
                ensure("interval_ticks", spawner.interval_ticks as f64, |v| v >= 1.0)?;
                spawner.template.validate()
            }
        }
    }

    /// The velocity-changing part of this effect, if any.
    pub fn as_entity_effect(&self) -> Option<&dyn EntityEffect> {
        match self {
            Self::Attractor(attractor) => Some(attractor),
            Self::Booster(booster) => Some(booster),
            Self::Spawner(_) => None,
        }
    }
}

/// Callback run on every entity once per tick, after the velocity pass.
pub type EntityScript = Box<dyn FnMut(&mut Entity) + Send>;

/// Ordered collection of entity scripts.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: Vec<EntityScript>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, script: F)
    where
        F: FnMut(&mut Entity) + Send + 'static,
    {
        self.scripts.push(Box::new(script));
    }

    pub fn clear(&mut self) {
        self.scripts.clear();
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Runs every script on `entity`, in registration order.
    pub fn run(&mut self, entity: &mut Entity) {
        for script in &mut self.scripts {
            script(entity);
        }
    }
}
