use crate::{core::entity::Entity, utils::allocator::Arena};

/// Verlet-style integrator: moves entities by their carried velocity, then
/// re-derives velocity from the positional change after relaxation.
///
/// Both passes touch each entity independently, so they may run in parallel.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub dt: f64,
    parallel: bool,
}

impl Integrator {
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            parallel: false,
        }
    }

    pub fn set_parallel(&mut self, enabled: bool) {
        self.parallel = enabled && cfg!(feature = "parallel");
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn integrate_positions(&self, entities: &mut Arena<Entity>) {
        let dt = self.dt;
        self.for_each(entities, move |entity| {
            entity.integrate(dt);
            entity.integrate_rotation(dt);
        });
    }

    pub fn update_velocities(&self, entities: &mut Arena<Entity>, gravity: f64, friction: f64) {
        let dt = self.dt;
        self.for_each(entities, move |entity| {
            entity.update_velocity(dt, gravity, friction)
        });
    }

    fn for_each<F>(&self, entities: &mut Arena<Entity>, f: F)
    where
        F: Fn(&mut Entity) + Send + Sync,
    {
        #[cfg(feature = "parallel")]
        if self.parallel {
            use rayon::prelude::*;
            entities.par_values_mut().for_each(f);
            return;
        }

        entities.values_mut().for_each(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{body::BodyId, entity::EntityDesc};
    use glam::DVec2;

    fn arena_with(count: usize) -> Arena<Entity> {
        let mut arena = Arena::new();
        for i in 0..count {
            let desc = EntityDesc::new(DVec2::new(i as f64, 0.0), 1.0, 1.0, 0.5)
                .with_velocity(DVec2::new(1.0, 2.0));
            arena.insert(Entity::new(format!("e{i}"), BodyId::new(0, 0), &desc).expect("valid"));
        }
        arena
    }

    #[test]
    fn sequential_and_parallel_passes_agree() {
        let mut sequential = arena_with(64);
        let mut parallel = arena_with(64);

        let mut integrator = Integrator::new(1.0 / 90.0);
        integrator.integrate_positions(&mut sequential);
        integrator.update_velocities(&mut sequential, 500.0, 0.001);

        integrator.set_parallel(true);
        integrator.integrate_positions(&mut parallel);
        integrator.update_velocities(&mut parallel, 500.0, 0.001);

        for ((_, a), (_, b)) in sequential.iter().zip(parallel.iter()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.velocity, b.velocity);
        }
    }
}
