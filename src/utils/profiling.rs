use std::time::{Duration, Instant};

/// Per-phase timing of the most recent `World::step`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProfile {
    pub integrate_time: Duration,
    pub relax_time: Duration,
    pub velocity_time: Duration,
    pub effects_time: Duration,
    pub total_time: Duration,

    pub entity_count: usize,
    pub entity_contacts: usize,
    pub ground_contacts: usize,
    pub pruned_bodies: usize,
}

impl StepProfile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Logs the profile at debug level.
    pub fn report(&self) {
        let total_us = self.total_time.as_micros() as f64;
        if total_us < 1.0 {
            return;
        }

        let share = |d: Duration| d.as_micros() as f64 / total_us * 100.0;
        log::debug!(
            "step: {} entities, {} entity contacts, {} ground contacts, {} pruned, {:.3} ms \
             (integrate {:.1}%, relax {:.1}%, velocity {:.1}%, effects {:.1}%)",
            self.entity_count,
            self.entity_contacts,
            self.ground_contacts,
            self.pruned_bodies,
            self.total_time.as_secs_f64() * 1000.0,
            share(self.integrate_time),
            share(self.relax_time),
            share(self.velocity_time),
            share(self.effects_time),
        );
    }
}

/// Adds the lifetime of the guard to a duration slot.
pub struct PhaseTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for PhaseTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
