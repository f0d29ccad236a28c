use glam::DVec2;

use crate::{
    collision::broadphase::BroadPhase,
    config::{BroadPhaseMode, CORRECTION_EPSILON, ROTATION_EPSILON},
    core::{
        collider::{ColliderId, ColliderShape, StaticCollider},
        entity::{Entity, EntityId},
    },
    utils::allocator::Arena,
};

/// Contact reported by a relaxation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contact {
    Entity { source: EntityId, target: EntityId },
    Ground { entity: EntityId, collider: ColliderId },
}

/// Counters for the most recent `relax` call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolverStepMetrics {
    pub passes: u32,
    pub ground_contacts: usize,
    pub entity_contacts: usize,
    pub constraints_solved: usize,
    pub dangling_targets_dropped: usize,
}

/// Gauss-Seidel position relaxation over ground contacts, entity pairs, and distance targets.
#[derive(Debug, Clone)]
pub struct PositionSolver {
    pub iterations: u32,
    broad_phase: BroadPhase,
    metrics: SolverStepMetrics,
}

impl PositionSolver {
    pub fn new(iterations: u32, mode: BroadPhaseMode) -> Self {
        debug_assert!(iterations >= 1, "config validation rejects zero iterations");
        Self {
            iterations,
            broad_phase: BroadPhase::new(mode),
            metrics: SolverStepMetrics::default(),
        }
    }

    pub fn set_broad_phase(&mut self, mode: BroadPhaseMode) {
        self.broad_phase = BroadPhase::new(mode);
    }

    pub fn metrics(&self) -> SolverStepMetrics {
        self.metrics
    }

    /// Runs `iterations` relaxation passes over `order`, appending every resolved contact.
    pub fn relax(
        &mut self,
        entities: &mut Arena<Entity>,
        colliders: &Arena<StaticCollider>,
        order: &[EntityId],
        contacts: &mut Vec<Contact>,
    ) {
        self.metrics = SolverStepMetrics::default();

        for _ in 0..self.iterations {
            self.metrics.passes += 1;
            self.solve_ground(entities, colliders, order, contacts);
            self.solve_pairs(entities, order, contacts);
            self.solve_targets(entities, order);
        }
    }

    fn solve_ground(
        &mut self,
        entities: &mut Arena<Entity>,
        colliders: &Arena<StaticCollider>,
        order: &[EntityId],
        contacts: &mut Vec<Contact>,
    ) {
        for &id in order {
            let Some(entity) = entities.get_mut(id) else {
                continue;
            };
            for (collider_id, collider) in colliders.iter() {
                if resolve_ground(entity, &collider.shape) {
                    self.metrics.ground_contacts += 1;
                    contacts.push(Contact::Ground {
                        entity: id,
                        collider: collider_id,
                    });
                }
            }
        }
    }

    fn solve_pairs(
        &mut self,
        entities: &mut Arena<Entity>,
        order: &[EntityId],
        contacts: &mut Vec<Contact>,
    ) {
        match self.broad_phase.mode() {
            BroadPhaseMode::BruteForce => {
                for i in 0..order.len() {
                    for j in (i + 1)..order.len() {
                        resolve_slots(entities, order, i, j, contacts, &mut self.metrics);
                    }
                }
            }
            BroadPhaseMode::UniformGrid { .. } => {
                self.broad_phase.rebuild(entities, order);
                let mut candidates = Vec::new();
                for i in 0..order.len() {
                    self.broad_phase.candidates(i, &mut candidates);
                    let mut last = i;
                    let mut cursor = 0;
                    loop {
                        while candidates.get(cursor).is_some_and(|&j| j <= last) {
                            cursor += 1;
                        }
                        let Some(&j) = candidates.get(cursor) else {
                            break;
                        };
                        last = j;
                        if resolve_slots(entities, order, i, j, contacts, &mut self.metrics) {
                            // Both ends moved: later candidates of `i` come from the new cells.
                            self.broad_phase.refresh(i, entities, order);
                            self.broad_phase.refresh(j, entities, order);
                            self.broad_phase.candidates(i, &mut candidates);
                            cursor = 0;
                        }
                    }
                }
            }
        }
    }

    fn solve_targets(&mut self, entities: &mut Arena<Entity>, order: &[EntityId]) {
        for &id in order {
            let mut k = 0;
            loop {
                let Some(target) = entities.get(id).and_then(|e| e.targets.get(k)).copied() else {
                    break;
                };

                match entities.get2_mut(id, target.entity) {
                    Some((source, peer)) => {
                        resolve_distance(source, peer, target.rest_distance, target.stiffness);
                        self.metrics.constraints_solved += 1;
                        k += 1;
                    }
                    None => {
                        if let Some(source) = entities.get_mut(id) {
                            log::trace!(
                                "dropping dangling target {:?} of {}",
                                target.entity,
                                source.name()
                            );
                            source.targets.remove(k);
                        }
                        self.metrics.dangling_targets_dropped += 1;
                    }
                }
            }
        }
    }
}

/// Resolves the pair at slots `i < j` of `order`, recording the contact.
fn resolve_slots(
    entities: &mut Arena<Entity>,
    order: &[EntityId],
    i: usize,
    j: usize,
    contacts: &mut Vec<Contact>,
    metrics: &mut SolverStepMetrics,
) -> bool {
    let (source, target) = (order[i], order[j]);
    let Some((a, b)) = entities.get2_mut(source, target) else {
        return false;
    };
    if !resolve_pair(a, b) {
        return false;
    }
    metrics.entity_contacts += 1;
    contacts.push(Contact::Entity { source, target });
    true
}

/// Pushes a movable entity out of a static collider. Returns whether they were in contact.
pub fn resolve_ground(entity: &mut Entity, shape: &ColliderShape) -> bool {
    if entity.is_immovable() {
        return false;
    }

    let contact = shape.project(entity.position);
    let delta = contact - entity.position;

    let reach = entity.radius() + shape.thickness();
    let extent = shape.extent();
    if delta.x.abs() >= reach + extent.x && delta.y.abs() >= reach + extent.y {
        return false;
    }

    let distance = delta.length();
    let limit = entity.radius() + shape.thickness() / 2.0;
    if distance > limit {
        return false;
    }

    let inv_mass = entity.inv_mass();
    let correction =
        (distance - limit) / (distance * inv_mass + CORRECTION_EPSILON) * entity.stiffness();
    entity.position += delta * correction * inv_mass;

    spin_against_point(entity, contact);
    true
}

/// Separates two overlapping entities along their center line, weighted by inverse mass.
///
/// Uses the source's stiffness. Returns whether they were in contact.
pub fn resolve_pair(source: &mut Entity, target: &mut Entity) -> bool {
    let total_inv_mass = source.inv_mass() + target.inv_mass();
    if total_inv_mass == 0.0 {
        return false;
    }

    let delta = target.position - source.position;
    let reach = source.radius() + target.radius();
    if delta.x.abs() >= reach && delta.y.abs() >= reach {
        return false;
    }

    let distance = delta.length();
    if distance > reach {
        return false;
    }

    let correction =
        (distance - reach) / (distance * total_inv_mass + CORRECTION_EPSILON) * source.stiffness();
    let step = delta * correction;
    source.position += step * source.inv_mass();
    target.position -= step * target.inv_mass();

    spin_pair(source, target);
    true
}

/// Pulls two connected entities towards `rest_distance`.
///
/// Corrections are weighted by raw mass rather than inverse mass, which keeps
/// heavy composite bodies stiff. A zero-mass endpoint never moves.
pub fn resolve_distance(source: &mut Entity, target: &mut Entity, rest_distance: f64, stiffness: f64) {
    let total_mass = source.mass() + target.mass();
    if total_mass == 0.0 {
        return;
    }

    let delta = target.position - source.position;
    let distance = delta.length();

    let correction =
        (distance - rest_distance) / (distance * total_mass + CORRECTION_EPSILON) * stiffness;
    let step = delta * correction;
    source.position += step * source.mass();
    target.position -= step * target.mass();
}

/// Side of approach (signed cross product) and spin increment for a contact
/// along `towards` while moving with `velocity`. `None` for near-zero vectors.
fn spin_increment(towards: DVec2, velocity: DVec2) -> Option<(f64, f64)> {
    let towards_len = towards.length();
    let speed = velocity.length();
    if towards_len < ROTATION_EPSILON || speed < ROTATION_EPSILON {
        return None;
    }

    let side = towards.x * -velocity.y + towards.y * velocity.x;
    let cos = (towards.dot(velocity) / (towards_len * speed)).clamp(-1.0, 1.0);
    Some((side, cos.acos().to_degrees() / 50.0))
}

fn spin_pair(source: &mut Entity, target: &mut Entity) {
    let Some((side, amount)) = spin_increment(target.position - source.position, source.velocity)
    else {
        return;
    };

    if side > 0.0 {
        source.rotation_speed -= amount;
        target.rotation_speed += amount;
    } else if side < 0.0 {
        source.rotation_speed += amount;
        target.rotation_speed -= amount;
    }
}

fn spin_against_point(entity: &mut Entity, contact: DVec2) {
    let Some((side, amount)) = spin_increment(contact - entity.position, entity.velocity) else {
        return;
    };

    if side > 0.0 {
        entity.rotation_speed += amount;
    } else if side < 0.0 {
        entity.rotation_speed -= amount;
    }
}
