use std::{
    collections::{HashMap, HashSet},
    time::Instant,
};

use glam::DVec2;

use crate::{
    collision::queries::{ColliderHit, PointQuery},
    config::WorldConfig,
    core::{
        body::{BodyId, BodySpec, CompositeBody},
        collider::{ColliderId, ColliderShape, ColliderSpec, StaticCollider},
        entity::{Entity, EntityId, Target},
    },
    dynamics::{
        effects::{Effect, EffectId, ScriptRegistry},
        integrator::Integrator,
        solver::{Contact, PositionSolver, SolverStepMetrics},
    },
    error::{ensure, PhysicsError, Result},
    utils::{
        allocator::Arena,
        logging::{warn_if_tick_budget_exceeded, ScopedTimer},
        profiling::{PhaseTimer, StepProfile},
    },
};

pub mod commands;
pub mod events;
pub mod snapshot;

pub use commands::{CommandQueue, CommandSender, WorldCommand};
pub use events::WorldObserver;
pub use snapshot::{BodySnapshot, EntitySnapshot, TargetSnapshot, WorldSnapshot};

/// Owns every simulated object and advances them one fixed tick at a time.
pub struct World {
    config: WorldConfig,
    entities: Arena<Entity>,
    bodies: Arena<CompositeBody>,
    colliders: Arena<StaticCollider>,
    effects: Arena<Effect>,
    entity_names: HashMap<String, EntityId>,
    body_names: HashMap<String, BodyId>,
    collider_names: HashMap<String, ColliderId>,
    integrator: Integrator,
    solver: PositionSolver,
    scripts: ScriptRegistry,
    observers: Vec<Box<dyn WorldObserver>>,
    /// Bodies in spawn order.
    body_order: Vec<BodyId>,
    /// Entities of `body_order`, each body's in its own order.
    order: Vec<EntityId>,
    contacts: Vec<Contact>,
    profile: StepProfile,
    tick: u64,
    name_counter: u64,
}

impl World {
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            integrator: Integrator::new(config.dt()),
            solver: PositionSolver::new(config.iterations, config.broad_phase),
            config,
            entities: Arena::new(),
            bodies: Arena::new(),
            colliders: Arena::new(),
            effects: Arena::new(),
            entity_names: HashMap::new(),
            body_names: HashMap::new(),
            collider_names: HashMap::new(),
            scripts: ScriptRegistry::new(),
            observers: Vec::new(),
            body_order: Vec::new(),
            order: Vec::new(),
            contacts: Vec::new(),
            profile: StepProfile::default(),
            tick: 0,
            name_counter: 0,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Replaces the configuration; takes effect on the next tick.
    pub fn set_config(&mut self, config: WorldConfig) -> Result<()> {
        config.validate()?;
        self.integrator.dt = config.dt();
        self.solver.iterations = config.iterations;
        if config.broad_phase != self.config.broad_phase {
            self.solver.set_broad_phase(config.broad_phase);
        }
        self.config = config;
        Ok(())
    }

    pub fn set_gravity(&mut self, gravity: f64) -> Result<()> {
        ensure("gravity", gravity, |_| true)?;
        self.config.gravity = gravity;
        Ok(())
    }

    pub fn set_friction(&mut self, friction: f64) -> Result<()> {
        ensure("friction", friction, |v| v >= 0.0)?;
        self.config.friction = friction;
        Ok(())
    }

    /// Runs the integration and velocity passes on the rayon pool when the
    /// `parallel` feature is compiled in.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.integrator.set_parallel(enabled);
    }

    pub fn parallel_enabled(&self) -> bool {
        self.integrator.parallel()
    }

    /// Number of ticks run since construction.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn last_profile(&self) -> &StepProfile {
        &self.profile
    }

    pub fn solver_metrics(&self) -> SolverStepMetrics {
        self.solver.metrics()
    }

    /// Advances the simulation by one fixed tick of `1 / pps` seconds.
    pub fn step(&mut self) {
        let _timer = ScopedTimer::new("World::step");
        let start = Instant::now();
        self.profile.reset();

        {
            let _phase = PhaseTimer::new(&mut self.profile.integrate_time);
            self.integrator.integrate_positions(&mut self.entities);
        }

        self.contacts.clear();
        {
            let _phase = PhaseTimer::new(&mut self.profile.relax_time);
            self.solver.relax(
                &mut self.entities,
                &self.colliders,
                &self.order,
                &mut self.contacts,
            );
        }
        self.dispatch_contacts();

        {
            let _phase = PhaseTimer::new(&mut self.profile.velocity_time);
            self.integrator.update_velocities(
                &mut self.entities,
                self.config.gravity,
                self.config.friction,
            );
        }

        let effects_start = Instant::now();
        self.run_scripts_and_effects();
        self.run_spawners();
        self.profile.effects_time += effects_start.elapsed();

        self.profile.pruned_bodies = self.prune_out_of_bounds();
        self.tick += 1;

        let metrics = self.solver.metrics();
        self.profile.entity_count = self.entities.len();
        self.profile.entity_contacts = metrics.entity_contacts;
        self.profile.ground_contacts = metrics.ground_contacts;
        self.profile.total_time = start.elapsed();
        self.profile.report();
        warn_if_tick_budget_exceeded(self.profile.total_time, 1000.0 / self.config.pps);

        self.notify(|observer, world| observer.on_update(world));
    }

    fn run_scripts_and_effects(&mut self) {
        let has_scripts = !self.scripts.is_empty();
        let has_effects = self
            .effects
            .iter()
            .any(|(_, effect)| effect.as_entity_effect().is_some());
        if !has_scripts && !has_effects {
            return;
        }

        for &id in &self.order {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            self.scripts.run(entity);
            for (_, effect) in self.effects.iter() {
                if let Some(effect) = effect.as_entity_effect() {
                    effect.apply(entity);
                }
            }
        }
    }

    fn run_spawners(&mut self) {
        let mut pending = Vec::new();
        for effect in self.effects.values_mut() {
            if let Effect::Spawner(spawner) = effect {
                pending.extend(spawner.tick());
            }
        }

        for spec in pending {
            if let Err(err) = self.spawn_body(spec) {
                log::warn!("spawner failed to spawn body: {err}");
            }
        }
    }

    fn prune_out_of_bounds(&mut self) -> usize {
        let map_size = self.config.map_size;
        let doomed: Vec<BodyId> = self
            .bodies
            .iter()
            .filter(|(_, body)| {
                body.position(&self.entities)
                    .is_some_and(|p| p.x.abs() > map_size || p.y.abs() > map_size)
            })
            .map(|(id, _)| id)
            .collect();

        for &id in &doomed {
            if let Some(body) = self.bodies.get(id) {
                log::debug!("pruning body {} outside the map", body.name);
            }
            self.despawn_body(id);
        }
        doomed.len()
    }

    fn dispatch_contacts(&mut self) {
        if self.observers.is_empty() || self.contacts.is_empty() {
            return;
        }

        let mut seen = HashSet::with_capacity(self.contacts.len());
        let contacts: Vec<Contact> = self
            .contacts
            .iter()
            .copied()
            .filter(|contact| seen.insert(*contact))
            .collect();

        self.notify(|observer, world| {
            for contact in &contacts {
                match *contact {
                    Contact::Entity { source, target } => {
                        observer.on_hit_entity(world, source, target)
                    }
                    Contact::Ground { entity, collider } => {
                        observer.on_hit_ground(world, entity, collider)
                    }
                }
            }
        });
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn WorldObserver, &World)) {
        if self.observers.is_empty() {
            return;
        }
        let mut observers = std::mem::take(&mut self.observers);
        for observer in &mut observers {
            f(observer.as_mut(), self);
        }
        self.observers = observers;
    }

    pub fn add_observer(&mut self, observer: Box<dyn WorldObserver>) {
        self.observers.push(observer);
    }

    /// Registers a callback run on every entity once per tick, after damping.
    pub fn add_script<F>(&mut self, script: F)
    where
        F: FnMut(&mut Entity) + Send + 'static,
    {
        self.scripts.add(script);
    }

    pub fn clear_scripts(&mut self) {
        self.scripts.clear();
    }

    // --- spawning -------------------------------------------------------

    /// Builds the body's entities and constraint edges. Nothing is inserted
    /// when validation fails.
    pub fn spawn_body(&mut self, spec: BodySpec) -> Result<BodyId> {
        let (descs, edges) = spec.layout()?;
        let name = self.claim_body_name(spec.name.as_deref(), spec.shape.kind_name())?;
        let body_id = self.bodies.next_handle();

        let entities = descs
            .iter()
            .enumerate()
            .map(|(i, desc)| {
                let entity_name = desc.name.clone().unwrap_or_else(|| format!("{name}.{i}"));
                Entity::new(entity_name, body_id, desc)
            })
            .collect::<Result<Vec<_>>>()?;
        self.check_entity_names(entities.iter().map(Entity::name))?;

        let ids: Vec<EntityId> = entities
            .into_iter()
            .map(|entity| self.insert_entity(entity))
            .collect();

        for edge in &edges {
            let (a, b) = (ids[edge.a], ids[edge.b]);
            for (from, to) in [(a, b), (b, a)] {
                if let Some(entity) = self.entities.get_mut(from) {
                    entity.add_target(Target {
                        entity: to,
                        rest_distance: edge.rest_distance,
                        stiffness: edge.stiffness,
                    });
                }
            }
        }

        let inserted = self.bodies.insert(CompositeBody {
            name: name.clone(),
            shape: spec.shape,
            mass: spec.mass,
            stiffness: spec.stiffness,
            entities: ids,
        });
        debug_assert_eq!(inserted, body_id);
        self.body_names.insert(name.clone(), body_id);
        self.body_order.push(body_id);
        self.rebuild_order();

        log::debug!("spawned {} {name}", spec.shape.kind_name());
        Ok(body_id)
    }

    /// Removes a body, its entities, and every edge that points at them.
    /// Returns `false` when the handle is stale.
    pub fn despawn_body(&mut self, id: BodyId) -> bool {
        let Some(body) = self.bodies.remove(id) else {
            return false;
        };
        self.body_names.remove(&body.name);
        self.body_order.retain(|&body_id| body_id != id);

        let removed: HashSet<EntityId> = body.entities.iter().copied().collect();
        for &entity_id in &body.entities {
            if let Some(entity) = self.entities.remove(entity_id) {
                self.entity_names.remove(entity.name());
            }
        }
        for entity in self.entities.values_mut() {
            entity
                .targets
                .retain(|target| !removed.contains(&target.entity));
        }

        self.rebuild_order();
        log::debug!("despawned {}", body.name);
        true
    }

    pub fn spawn_collider(&mut self, spec: ColliderSpec) -> Result<ColliderId> {
        let name = match spec.name {
            Some(name) if self.collider_names.contains_key(&name) => {
                return Err(PhysicsError::DuplicateName(name));
            }
            Some(name) => name,
            None => {
                let kind = match spec.shape {
                    ColliderShape::Ground(_) => "ground",
                    ColliderShape::Curve(_) => "curve",
                };
                self.generate_name(kind, |world, candidate| {
                    world.collider_names.contains_key(candidate)
                })
            }
        };

        let id = self.colliders.insert(StaticCollider {
            name: name.clone(),
            shape: spec.shape,
        });
        self.collider_names.insert(name, id);
        Ok(id)
    }

    pub fn despawn_collider(&mut self, id: ColliderId) -> bool {
        match self.colliders.remove(id) {
            Some(collider) => {
                self.collider_names.remove(&collider.name);
                true
            }
            None => false,
        }
    }

    pub fn add_effect(&mut self, effect: Effect) -> Result<EffectId> {
        effect.validate()?;
        Ok(self.effects.insert(effect))
    }

    pub fn remove_effect(&mut self, id: EffectId) -> bool {
        self.effects.remove(id).is_some()
    }

    /// Removes every body. With `force`, colliders and effects go too.
    pub fn clear(&mut self, force: bool) {
        self.bodies.clear();
        self.entities.clear();
        self.body_names.clear();
        self.entity_names.clear();
        self.body_order.clear();
        self.order.clear();

        if force {
            self.colliders.clear();
            self.collider_names.clear();
            self.effects.clear();
        }
        log::debug!("cleared world (force = {force})");
    }

    /// Adds a symmetric distance constraint at the current separation.
    /// Returns `false` if the two entities were already connected.
    pub fn connect(&mut self, a: EntityId, b: EntityId, stiffness: f64) -> Result<bool> {
        ensure("stiffness", stiffness, |v| (0.0..=1.0).contains(&v))?;
        if a == b {
            return Err(match self.entities.get(a) {
                Some(entity) => PhysicsError::SelfConstraint(entity.name().to_string()),
                None => PhysicsError::UnknownEntity(format!("{a:?}")),
            });
        }
        let Some((source, target)) = self.entities.get2_mut(a, b) else {
            let missing = if self.entities.contains(a) { b } else { a };
            return Err(PhysicsError::UnknownEntity(format!("{missing:?}")));
        };

        let rest_distance = source.position.distance(target.position);
        let added = source.add_target(Target {
            entity: b,
            rest_distance,
            stiffness,
        });
        target.add_target(Target {
            entity: a,
            rest_distance,
            stiffness,
        });
        Ok(added)
    }

    /// Removes the constraint between `a` and `b` on both sides.
    pub fn disconnect(&mut self, a: EntityId, b: EntityId) -> bool {
        let mut removed = false;
        if let Some(entity) = self.entities.get_mut(a) {
            removed |= entity.remove_target(b);
        }
        if let Some(entity) = self.entities.get_mut(b) {
            removed |= entity.remove_target(a);
        }
        removed
    }

    // --- queries ----------------------------------------------------------

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn body(&self, id: BodyId) -> Option<&CompositeBody> {
        self.bodies.get(id)
    }

    pub fn collider(&self, id: ColliderId) -> Option<&StaticCollider> {
        self.colliders.get(id)
    }

    pub fn collider_mut(&mut self, id: ColliderId) -> Option<&mut StaticCollider> {
        self.colliders.get_mut(id)
    }

    pub fn effect(&self, id: EffectId) -> Option<&Effect> {
        self.effects.get(id)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.entity_names.get(name).copied()
    }

    pub fn body_by_name(&self, name: &str) -> Option<BodyId> {
        self.body_names.get(name).copied()
    }

    pub fn collider_by_name(&self, name: &str) -> Option<ColliderId> {
        self.collider_names.get(name).copied()
    }

    /// Entities in solver order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.order
            .iter()
            .filter_map(|&id| self.entities.get(id).map(|entity| (id, entity)))
    }

    /// Bodies in spawn order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &CompositeBody)> + '_ {
        self.body_order
            .iter()
            .filter_map(|&id| self.bodies.get(id).map(|body| (id, body)))
    }

    pub fn colliders(&self) -> impl Iterator<Item = (ColliderId, &StaticCollider)> + '_ {
        self.colliders.iter()
    }

    pub fn effects(&self) -> impl Iterator<Item = (EffectId, &Effect)> + '_ {
        self.effects.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn body_position(&self, id: BodyId) -> Option<DVec2> {
        self.bodies.get(id)?.position(&self.entities)
    }

    pub fn body_velocity(&self, id: BodyId) -> Option<DVec2> {
        self.bodies.get(id)?.velocity(&self.entities)
    }

    pub fn body_rotation(&self, id: BodyId) -> Option<f64> {
        self.bodies.get(id)?.rotation(&self.entities)
    }

    /// Topmost entity whose disc contains `point`.
    pub fn entity_at(&self, point: DVec2) -> Option<EntityId> {
        PointQuery::entity_at(&self.entities, &self.order, point)
    }

    pub fn body_at(&self, point: DVec2) -> Option<BodyId> {
        self.entity_at(point)
            .and_then(|id| self.entities.get(id))
            .map(Entity::parent)
    }

    /// Nearest collider whose thickness band, grown by `tolerance`, contains `point`.
    pub fn collider_near(&self, point: DVec2, tolerance: f64) -> Option<ColliderId> {
        self.colliders_near(point, tolerance)
            .first()
            .map(|hit| hit.collider_id)
    }

    pub fn colliders_near(&self, point: DVec2, tolerance: f64) -> Vec<ColliderHit> {
        PointQuery::colliders_near(&self.colliders, point, tolerance)
    }

    // --- bookkeeping --------------------------------------------------------

    fn insert_entity(&mut self, entity: Entity) -> EntityId {
        let name = entity.name().to_string();
        let id = self.entities.insert(entity);
        self.entity_names.insert(name, id);
        id
    }

    fn rebuild_order(&mut self) {
        self.order.clear();
        for &id in &self.body_order {
            if let Some(body) = self.bodies.get(id) {
                self.order.extend(body.entities.iter().copied());
            }
        }
    }

    fn claim_body_name(&mut self, requested: Option<&str>, kind: &str) -> Result<String> {
        match requested {
            Some(name) if self.body_names.contains_key(name) => {
                Err(PhysicsError::DuplicateName(name.to_string()))
            }
            Some(name) => Ok(name.to_string()),
            None => Ok(self.generate_name(kind, |world, candidate| {
                world.body_names.contains_key(candidate)
            })),
        }
    }

    fn check_entity_names<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let mut fresh = HashSet::new();
        for name in names {
            if self.entity_names.contains_key(name) || !fresh.insert(name) {
                return Err(PhysicsError::DuplicateName(name.to_string()));
            }
        }
        Ok(())
    }

    fn generate_name(&mut self, kind: &str, taken: impl Fn(&Self, &str) -> bool) -> String {
        loop {
            self.name_counter += 1;
            let candidate = format!("{kind}-{}", self.name_counter);
            if !taken(self, &candidate) {
                return candidate;
            }
        }
    }
}
