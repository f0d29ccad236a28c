use log::{log_enabled, warn, Level};
use std::time::{Duration, Instant};

/// Scoped timer that traces the wall time of a solver phase.
pub struct ScopedTimer<'a> {
    label: &'a str,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        if log_enabled!(Level::Trace) {
            let elapsed = self.start.elapsed();
            log::trace!("end {} ({} µs)", self.label, elapsed.as_micros());
        }
    }
}

/// Emits a warning when a single tick took longer than its real-time slot.
pub fn warn_if_tick_budget_exceeded(duration: Duration, budget_ms: f64) -> bool {
    let elapsed_ms = duration.as_secs_f64() * 1000.0;
    if elapsed_ms > budget_ms {
        warn!("Tick exceeded budget: {elapsed_ms:.2} ms > {budget_ms:.2} ms");
        true
    } else {
        false
    }
}
